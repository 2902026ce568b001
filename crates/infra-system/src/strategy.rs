// Launch strategy selection
// One function decides how the game is started on each host class

use crate::platform::HostPlatform;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use vsl_core::port::{LaunchError, LaunchRequest};

/// Native Linux build of the game
pub const NATIVE_BINARY: &str = "Vintagestory";
/// .NET build (native on Windows, interpreted elsewhere)
pub const ASSEMBLY: &str = "Vintagestory.exe";

/// How the game will be started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchStrategy {
    /// Run the executable itself
    Direct(PathBuf),
    /// Run the assembly through a compatibility interpreter (mono)
    Interpreted {
        interpreter: PathBuf,
        assembly: PathBuf,
    },
}

/// Fully resolved program + argument vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

/// Pick the launch strategy for `executable_root` on `platform`.
///
/// # Errors
/// - LaunchError::UnsupportedPlatform on hosts the game does not run on
/// - LaunchError::NoLaunchStrategyFound if neither build is present (Linux-like)
pub fn select_strategy(
    platform: &HostPlatform,
    executable_root: &Path,
    interpreter: &Path,
) -> Result<LaunchStrategy, LaunchError> {
    match platform {
        HostPlatform::Unsupported(os) => Err(LaunchError::UnsupportedPlatform(os.clone())),
        HostPlatform::WindowsLike => Ok(LaunchStrategy::Direct(executable_root.join(ASSEMBLY))),
        HostPlatform::LinuxLike => {
            let native = executable_root.join(NATIVE_BINARY);
            if native.is_file() {
                return Ok(LaunchStrategy::Direct(native));
            }

            let assembly = executable_root.join(ASSEMBLY);
            if assembly.is_file() {
                return Ok(LaunchStrategy::Interpreted {
                    interpreter: interpreter.to_path_buf(),
                    assembly,
                });
            }

            Err(LaunchError::NoLaunchStrategyFound(
                executable_root.to_path_buf(),
            ))
        }
    }
}

/// Game arguments: `--dataPath=<installation>` followed by the start params
pub fn game_args(request: &LaunchRequest) -> Vec<OsString> {
    let mut data_path = OsString::from("--dataPath=");
    data_path.push(request.data_path.as_os_str());

    let mut args = vec![data_path];
    args.extend(request.start_params.split_whitespace().map(OsString::from));
    args
}

impl LaunchStrategy {
    pub fn into_command(self, request: &LaunchRequest) -> LaunchCommand {
        match self {
            LaunchStrategy::Direct(program) => LaunchCommand {
                program,
                args: game_args(request),
            },
            LaunchStrategy::Interpreted {
                interpreter,
                assembly,
            } => {
                let mut args = vec![assembly.into_os_string()];
                args.extend(game_args(request));
                LaunchCommand {
                    program: interpreter,
                    args,
                }
            }
        }
    }
}
