// Game process launcher over tokio::process
// reason: tokio for async child management, nix for POSIX signals
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::platform::HostPlatform;
use crate::strategy::select_strategy;
use vsl_core::application::constants::DEFAULT_TERMINATE_GRACE_MS;
use vsl_core::port::{
    LaunchError, LaunchOutcome, LaunchRequest, OutputLine, OutputStream, ProcessEvent,
    ProcessLauncher, TimeProvider,
};

/// Interval between liveness checks while waiting for a terminated process
const TERMINATE_POLL_MS: u64 = 100;

/// Launcher settings
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    pub platform: HostPlatform,
    /// Compatibility interpreter for `Vintagestory.exe` on Linux-like hosts
    pub interpreter: PathBuf,
    /// Wait between SIGTERM and SIGKILL
    pub terminate_grace_ms: i64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            platform: HostPlatform::current(),
            interpreter: PathBuf::from("mono"),
            terminate_grace_ms: DEFAULT_TERMINATE_GRACE_MS,
        }
    }
}

/// Spawns the game and supervises it until exit
pub struct GameProcessLauncher {
    config: LauncherConfig,
    time_provider: Arc<dyn TimeProvider>,
}

impl GameProcessLauncher {
    pub fn new(config: LauncherConfig, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            config,
            time_provider,
        }
    }

    /// Kill process with SIGTERM first, then SIGKILL after the grace period
    #[cfg(unix)]
    async fn kill_graceful(&self, pid: u32) -> Result<(), LaunchError> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let raw = i32::try_from(pid)
            .map_err(|_| LaunchError::Terminate(format!("invalid pid {}", pid)))?;
        let target = Pid::from_raw(raw);

        info!(pid = %pid, "Sending SIGTERM to game process");
        match kill(target, Signal::SIGTERM) {
            Ok(()) => {}
            Err(Errno::ESRCH) => return Ok(()),
            Err(e) => return Err(LaunchError::Terminate(format!("SIGTERM failed: {}", e))),
        }

        let start_time = self.time_provider.now_millis();
        loop {
            tokio::time::sleep(Duration::from_millis(TERMINATE_POLL_MS)).await;

            // Signal 0 only probes for existence
            if kill(target, None).is_err() {
                info!(pid = %pid, "Game process exited after SIGTERM");
                return Ok(());
            }

            if self.time_provider.now_millis() - start_time > self.config.terminate_grace_ms {
                warn!(pid = %pid, "Game process ignored SIGTERM, sending SIGKILL");
                return match kill(target, Signal::SIGKILL) {
                    Ok(()) | Err(Errno::ESRCH) => Ok(()),
                    Err(e) => Err(LaunchError::Terminate(format!("SIGKILL failed: {}", e))),
                };
            }
        }
    }

    #[cfg(windows)]
    async fn kill_graceful(&self, pid: u32) -> Result<(), LaunchError> {
        info!(pid = %pid, "Killing game process with taskkill");
        let pid_arg = pid.to_string();
        let output = Command::new("taskkill")
            .args(["/F", "/PID", pid_arg.as_str()])
            .output()
            .await
            .map_err(|e| LaunchError::Terminate(e.to_string()))?;

        if !output.status.success() {
            return Err(LaunchError::Terminate(format!(
                "taskkill failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }

    #[cfg(not(any(unix, windows)))]
    async fn kill_graceful(&self, pid: u32) -> Result<(), LaunchError> {
        Err(LaunchError::Terminate(format!(
            "cannot signal pid {} on this platform",
            pid
        )))
    }
}

/// Forward one child stream line by line: log it, then offer it to the side channel
async fn pump_lines<R>(
    reader: Option<R>,
    stream: OutputStream,
    task_id: &str,
    events: &mpsc::Sender<ProcessEvent>,
) where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut segments = BufReader::new(reader).split(b'\n');

    loop {
        let bytes = match segments.next_segment().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => break,
            Err(e) => {
                warn!(task_id = %task_id, stream = ?stream, error = %e, "Stopped reading game output");
                break;
            }
        };
        let line = String::from_utf8_lossy(&bytes)
            .trim_end_matches('\r')
            .to_string();

        match stream {
            OutputStream::Stdout => info!(task_id = %task_id, stream = "stdout", "{}", line),
            OutputStream::Stderr => error!(task_id = %task_id, stream = "stderr", "{}", line),
        }

        // Full side channel: the line is already logged, drop it here
        let _ = events.try_send(ProcessEvent::Output(OutputLine {
            task_id: task_id.to_string(),
            stream,
            line,
        }));
    }
}

#[async_trait]
impl ProcessLauncher for GameProcessLauncher {
    async fn launch(
        &self,
        request: LaunchRequest,
        events: mpsc::Sender<ProcessEvent>,
    ) -> Result<LaunchOutcome, LaunchError> {
        let strategy = select_strategy(
            &self.config.platform,
            &request.executable_root,
            &self.config.interpreter,
        )?;
        let command = strategy.into_command(&request);
        let task_id = request.task_id.as_str();

        info!(
            task_id = %task_id,
            platform = %self.config.platform,
            program = %command.program.display(),
            args = ?command.args,
            "Starting game process"
        );

        let start_time = self.time_provider.now_millis();
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| LaunchError::SpawnFailed {
                program: command.program.display().to_string(),
                reason: e.to_string(),
            })?;

        let pid = child.id();
        if let Some(pid) = pid {
            let _ = events.send(ProcessEvent::Spawned { pid }).await;
        }

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (_, _, status) = tokio::join!(
            pump_lines(stdout, OutputStream::Stdout, task_id, &events),
            pump_lines(stderr, OutputStream::Stderr, task_id, &events),
            child.wait(),
        );
        let status = status.map_err(|e| LaunchError::Io(e.to_string()))?;

        let duration_ms = self.time_provider.now_millis() - start_time;
        let exit_code = status.code();
        info!(
            task_id = %task_id,
            pid = ?pid,
            exit_code = ?exit_code,
            duration_ms = %duration_ms,
            "Game process exited"
        );

        Ok(LaunchOutcome {
            pid,
            exit_code,
            duration_ms,
        })
    }

    async fn terminate(&self, pid: u32) -> Result<(), LaunchError> {
        self.kill_graceful(pid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{ASSEMBLY, NATIVE_BINARY};
    use std::path::Path;
    use tempfile::TempDir;
    use vsl_core::port::time_provider::SystemTimeProvider;

    fn launcher(platform: HostPlatform, interpreter: &str) -> GameProcessLauncher {
        GameProcessLauncher::new(
            LauncherConfig {
                platform,
                interpreter: PathBuf::from(interpreter),
                terminate_grace_ms: 2_000,
            },
            Arc::new(SystemTimeProvider),
        )
    }

    fn request(root: &Path, start_params: &str) -> LaunchRequest {
        LaunchRequest {
            task_id: "task-7".to_string(),
            executable_root: root.to_path_buf(),
            data_path: PathBuf::from("/data/main"),
            start_params: start_params.to_string(),
        }
    }

    fn drain(rx: &mut mpsc::Receiver<ProcessEvent>) -> Vec<ProcessEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        seen
    }

    #[tokio::test]
    async fn test_unsupported_platform_spawns_nothing() {
        let dir = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::channel(8);

        let result = launcher(HostPlatform::Unsupported("haiku".to_string()), "mono")
            .launch(request(dir.path(), ""), tx)
            .await;

        assert_eq!(
            result,
            Err(LaunchError::UnsupportedPlatform("haiku".to_string()))
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_failure() {
        let dir = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::channel(8);

        let result = launcher(HostPlatform::WindowsLike, "mono")
            .launch(request(dir.path(), ""), tx)
            .await;

        assert!(matches!(result, Err(LaunchError::SpawnFailed { .. })));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        fn write_script(path: &Path, body: &str) {
            fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
        }

        #[tokio::test]
        async fn test_native_binary_output_and_exit_code() {
            let dir = TempDir::new().unwrap();
            write_script(
                &dir.path().join(NATIVE_BINARY),
                "echo \"started with $1 $2\"\necho 'shader missing' >&2\nexit 3",
            );
            let (tx, mut rx) = mpsc::channel(16);

            let outcome = launcher(HostPlatform::LinuxLike, "mono")
                .launch(request(dir.path(), "--tracelog"), tx)
                .await
                .unwrap();

            assert_eq!(outcome.exit_code, Some(3));
            assert!(outcome.pid.is_some());

            let events = drain(&mut rx);
            assert!(matches!(events[0], ProcessEvent::Spawned { .. }));
            let lines: Vec<OutputLine> = events
                .into_iter()
                .filter_map(|e| match e {
                    ProcessEvent::Output(line) => Some(line),
                    _ => None,
                })
                .collect();
            assert!(lines.iter().any(|l| l.stream == OutputStream::Stdout
                && l.line == "started with --dataPath=/data/main --tracelog"));
            assert!(lines
                .iter()
                .any(|l| l.stream == OutputStream::Stderr && l.line == "shader missing"));
            assert!(lines.iter().all(|l| l.task_id == "task-7"));
        }

        #[tokio::test]
        async fn test_assembly_runs_through_interpreter() {
            let dir = TempDir::new().unwrap();
            // /bin/sh stands in for mono: it receives the assembly path as its script
            fs::write(dir.path().join(ASSEMBLY), "echo \"interpreted $1\"\n").unwrap();
            let (tx, mut rx) = mpsc::channel(16);

            let outcome = launcher(HostPlatform::LinuxLike, "/bin/sh")
                .launch(request(dir.path(), ""), tx)
                .await
                .unwrap();

            assert_eq!(outcome.exit_code, Some(0));
            let saw_line = drain(&mut rx).into_iter().any(|e| {
                matches!(e, ProcessEvent::Output(ref l) if l.line == "interpreted --dataPath=/data/main")
            });
            assert!(saw_line);
        }

        #[tokio::test]
        async fn test_no_strategy_found() {
            let dir = TempDir::new().unwrap();
            let (tx, _rx) = mpsc::channel(8);

            let result = launcher(HostPlatform::LinuxLike, "mono")
                .launch(request(dir.path(), ""), tx)
                .await;

            assert!(matches!(result, Err(LaunchError::NoLaunchStrategyFound(_))));
        }

        #[tokio::test]
        async fn test_full_side_channel_does_not_block_exit() {
            let dir = TempDir::new().unwrap();
            write_script(
                &dir.path().join(NATIVE_BINARY),
                "i=0\nwhile [ $i -lt 50 ]; do echo line $i; i=$((i+1)); done",
            );
            // Nobody reads: only Spawned plus one line fit
            let (tx, _rx) = mpsc::channel(2);

            let outcome = launcher(HostPlatform::LinuxLike, "mono")
                .launch(request(dir.path(), ""), tx)
                .await
                .unwrap();

            assert_eq!(outcome.exit_code, Some(0));
        }

        #[tokio::test]
        async fn test_terminate_running_game() {
            let dir = TempDir::new().unwrap();
            write_script(&dir.path().join(NATIVE_BINARY), "exec sleep 30");
            let launcher = Arc::new(launcher(HostPlatform::LinuxLike, "mono"));
            let (tx, mut rx) = mpsc::channel(8);

            let running = {
                let launcher = Arc::clone(&launcher);
                let request = request(dir.path(), "");
                tokio::spawn(async move { launcher.launch(request, tx).await })
            };

            let pid = match rx.recv().await {
                Some(ProcessEvent::Spawned { pid }) => pid,
                other => panic!("expected Spawned, got {:?}", other),
            };
            launcher.terminate(pid).await.unwrap();

            let outcome = running.await.unwrap().unwrap();
            assert_eq!(outcome.exit_code, None);
        }

        #[tokio::test]
        async fn test_terminate_unknown_pid_is_ok() {
            // Far above any default pid_max
            let result = launcher(HostPlatform::LinuxLike, "mono")
                .terminate(i32::MAX as u32 - 1)
                .await;
            tokio_test::assert_ok!(result);
        }
    }
}
