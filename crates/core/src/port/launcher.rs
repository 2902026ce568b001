// Process Launcher Port
// Abstraction for starting the game executable as a supervised child process

use crate::domain::TaskId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

/// Everything the launcher needs for one invocation
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Task the process output is tagged with
    pub task_id: TaskId,
    /// Directory of the game build (GameVersion path)
    pub executable_root: PathBuf,
    /// Installation data directory, passed as `--dataPath=<path>`
    pub data_path: PathBuf,
    pub start_params: String,
}

/// Result of a process that ran to exit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub pid: Option<u32>,
    /// None when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of child output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    pub task_id: TaskId,
    pub stream: OutputStream,
    pub line: String,
}

/// Side-channel events emitted while a launch is running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// Sent once, right after the OS created the process
    Spawned { pid: u32 },
    /// Best effort; dropped when the channel is full
    Output(OutputLine),
}

/// Launch errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("No launch strategy found in {}", .0.display())]
    NoLaunchStrategyFound(PathBuf),

    #[error("Spawn failed for {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("Terminate failed: {0}")]
    Terminate(String),
}

/// Process Launcher trait
///
/// Implementations:
/// - GameProcessLauncher (infra-system): platform-resolved tokio child process
/// - MockLauncher: scripted behaviour for tests
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Launch the game and wait for it to exit.
    ///
    /// Resolves exactly once. Any exit (clean, non-zero, signal) is `Ok`; the
    /// exit code is reported in `LaunchOutcome`.
    ///
    /// # Errors
    /// - LaunchError::UnsupportedPlatform if the host cannot run the game
    /// - LaunchError::NoLaunchStrategyFound if no known executable exists
    /// - LaunchError::SpawnFailed if the OS refused to create the process
    async fn launch(
        &self,
        request: LaunchRequest,
        events: mpsc::Sender<ProcessEvent>,
    ) -> Result<LaunchOutcome, LaunchError>;

    /// Ask a running process to terminate (graceful first, then forced)
    async fn terminate(&self, pid: u32) -> Result<(), LaunchError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Pid reported by the mock for every spawned "process"
    pub const MOCK_PID: u32 = 4242;

    /// Mock launcher behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Exit immediately with this code (None = killed by signal)
        Exit(Option<i32>),
        /// Keep running until `release()` or `terminate()` is called
        UntilReleased,
        /// Fail before spawning
        Fail(LaunchError),
    }

    /// Mock Process Launcher for testing
    pub struct MockLauncher {
        behavior: Mutex<MockBehavior>,
        release: Notify,
        terminated: AtomicBool,
        launch_count: AtomicUsize,
        requests: Mutex<Vec<LaunchRequest>>,
        output: Vec<(OutputStream, String)>,
        terminate_error: Option<LaunchError>,
    }

    impl MockLauncher {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Mutex::new(behavior),
                release: Notify::new(),
                terminated: AtomicBool::new(false),
                launch_count: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
                output: Vec::new(),
                terminate_error: None,
            }
        }

        pub fn new_exit(code: i32) -> Self {
            Self::new(MockBehavior::Exit(Some(code)))
        }

        pub fn new_blocking() -> Self {
            Self::new(MockBehavior::UntilReleased)
        }

        pub fn new_fail(error: LaunchError) -> Self {
            Self::new(MockBehavior::Fail(error))
        }

        /// Lines emitted on the side channel after spawning
        pub fn with_output(mut self, stream: OutputStream, line: impl Into<String>) -> Self {
            self.output.push((stream, line.into()));
            self
        }

        /// `terminate` fails with this error and leaves the process running
        pub fn with_terminate_error(mut self, error: LaunchError) -> Self {
            self.terminate_error = Some(error);
            self
        }

        /// Let an `UntilReleased` launch exit with code 0
        pub fn release(&self) {
            self.release.notify_one();
        }

        pub fn launch_count(&self) -> usize {
            self.launch_count.load(Ordering::SeqCst)
        }

        pub fn was_terminated(&self) -> bool {
            self.terminated.load(Ordering::SeqCst)
        }

        pub fn requests(&self) -> Vec<LaunchRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessLauncher for MockLauncher {
        async fn launch(
            &self,
            request: LaunchRequest,
            events: mpsc::Sender<ProcessEvent>,
        ) -> Result<LaunchOutcome, LaunchError> {
            let behavior = self.behavior.lock().unwrap().clone();
            if let MockBehavior::Fail(error) = &behavior {
                return Err(error.clone());
            }

            self.launch_count.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());

            let _ = events.send(ProcessEvent::Spawned { pid: MOCK_PID }).await;
            for (stream, line) in &self.output {
                let _ = events
                    .send(ProcessEvent::Output(OutputLine {
                        task_id: request.task_id.clone(),
                        stream: *stream,
                        line: line.clone(),
                    }))
                    .await;
            }

            let exit_code = match behavior {
                MockBehavior::Exit(code) => code,
                MockBehavior::UntilReleased => {
                    self.release.notified().await;
                    if self.was_terminated() {
                        None
                    } else {
                        Some(0)
                    }
                }
                MockBehavior::Fail(error) => return Err(error),
            };

            Ok(LaunchOutcome {
                pid: Some(MOCK_PID),
                exit_code,
                duration_ms: 10,
            })
        }

        async fn terminate(&self, _pid: u32) -> Result<(), LaunchError> {
            if let Some(error) = &self.terminate_error {
                return Err(error.clone());
            }
            self.terminated.store(true, Ordering::SeqCst);
            self.release.notify_one();
            Ok(())
        }
    }
}
