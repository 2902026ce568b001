// Game launch orchestration (single-flight per version/installation pair)

use super::{lock_launches, ActiveLaunch, ActiveLaunches, Supervisor};
use crate::application::constants::TERMINATED_BY_USER;
use crate::domain::{GameVersion, Installation, LaunchKey, TaskId, TaskType};
use crate::error::{AppError, Result};
use crate::port::{LaunchOutcome, LaunchRequest, ProcessEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Result of a launch that ran until the game exited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    pub task_id: TaskId,
    pub outcome: LaunchOutcome,
}

/// Single-flight slot for one pair; released on drop, whatever the outcome
struct LaunchClaim {
    launches: ActiveLaunches,
    key: LaunchKey,
}

impl LaunchClaim {
    fn acquire(launches: &ActiveLaunches, key: &LaunchKey) -> Result<Self> {
        let mut active = lock_launches(launches);
        if active.contains_key(key) {
            return Err(AppError::LaunchAlreadyInProgress(key.to_string()));
        }
        active.insert(key.clone(), ActiveLaunch::default());
        Ok(Self {
            launches: Arc::clone(launches),
            key: key.clone(),
        })
    }

    fn bind_task(&self, task_id: &str) {
        if let Some(launch) = lock_launches(&self.launches).get_mut(&self.key) {
            launch.task_id = Some(task_id.to_string());
        }
    }
}

impl Drop for LaunchClaim {
    fn drop(&mut self) {
        lock_launches(&self.launches).remove(&self.key);
    }
}

impl Supervisor {
    /// Launch the game for one installation and wait until it exits.
    ///
    /// Resolves `Ok` for every exit, clean or not; the launch task records
    /// which one it was (exit code 0 completes it, anything else fails it).
    /// Supervision runs on its own tokio task: dropping this future does not
    /// abandon the process, its task or its single-flight slot.
    ///
    /// # Errors
    /// - AppError::LaunchAlreadyInProgress if this pair is already running (no task is created)
    /// - AppError::Launch for platform, strategy and spawn failures (the task is failed)
    pub async fn execute_game(
        &self,
        version: &GameVersion,
        installation: &Installation,
    ) -> Result<LaunchReport> {
        let key = LaunchKey::new(version, installation);
        info!(
            version = %version.version,
            installation = %installation.id,
            "Executing game version"
        );

        let claim = LaunchClaim::acquire(&self.active_launches, &key).inspect_err(|_| {
            warn!(launch = %key, "Launch rejected: already in progress");
        })?;

        let task_id = self.registry.create_task(
            TaskType::GameLaunch,
            format!("Vintage Story {}", version.version),
        );
        claim.bind_task(&task_id);
        self.registry.start(&task_id);

        let request = LaunchRequest {
            task_id: task_id.clone(),
            executable_root: version.path.clone(),
            data_path: installation.path.clone(),
            start_params: installation.start_params.clone(),
        };

        match tokio::spawn(self.clone().supervise_launch(claim, request)).await {
            Ok(result) => result,
            Err(e) => {
                let reason = format!("launch supervision aborted: {}", e);
                self.fail_task(&task_id, "Game launch failed", &reason);
                Err(AppError::Internal(reason))
            }
        }
    }

    /// Run one launch to exit and settle its task; the claim is released last
    async fn supervise_launch(
        self,
        claim: LaunchClaim,
        request: LaunchRequest,
    ) -> Result<LaunchReport> {
        let task_id = request.task_id.clone();
        let (events_tx, events_rx) = mpsc::channel(self.config.output_buffer.max(1));
        let relay = tokio::spawn(self.clone().relay_process_events(claim.key.clone(), events_rx));

        let result = self.launcher.launch(request, events_tx).await;

        // The sender went down with `launch`; the relay drains what is left and stops
        let _ = relay.await;

        let report = match result {
            Ok(outcome) => {
                self.settle_exit(&claim.key, &task_id, &outcome);
                Ok(LaunchReport { task_id, outcome })
            }
            Err(e) => {
                self.fail_task(&task_id, "Game launch failed", &e.to_string());
                Err(e.into())
            }
        };
        drop(claim);
        report
    }

    /// Terminate the running game for this pair and force its task to failed.
    ///
    /// The task is only failed once the terminate request was delivered.
    /// Returns false when the launch has not spawned a process yet.
    ///
    /// # Errors
    /// - AppError::NotFound if no launch is active for the pair
    /// - AppError::Launch if the terminate signal could not be delivered (the task keeps running)
    pub async fn cancel_launch(
        &self,
        version: &GameVersion,
        installation: &Installation,
    ) -> Result<bool> {
        let key = LaunchKey::new(version, installation);
        let (task_id, pid) = {
            let mut active = lock_launches(&self.active_launches);
            let launch = active
                .get_mut(&key)
                .ok_or_else(|| AppError::NotFound(format!("No active launch for {}", key)))?;
            if launch.pid.is_some() {
                launch.cancelled = true;
            }
            (launch.task_id.clone(), launch.pid)
        };

        let Some(pid) = pid else {
            warn!(launch = %key, "Cancel requested before the game process was spawned");
            return Ok(false);
        };

        info!(launch = %key, pid = pid, "Cancelling game launch");
        if let Err(e) = self.launcher.terminate(pid).await {
            warn!(launch = %key, pid = pid, error = %e, "Terminate request failed");
            if let Some(launch) = lock_launches(&self.active_launches).get_mut(&key) {
                launch.cancelled = false;
            }
            return Err(e.into());
        }

        if let Some(task_id) = &task_id {
            self.fail_task(task_id, "Game launch cancelled", TERMINATED_BY_USER);
        }
        Ok(true)
    }

    /// Whether a launch currently holds the slot for this pair
    pub fn is_launch_active(&self, version: &GameVersion, installation: &Installation) -> bool {
        lock_launches(&self.active_launches).contains_key(&LaunchKey::new(version, installation))
    }

    fn settle_exit(&self, key: &LaunchKey, task_id: &str, outcome: &LaunchOutcome) {
        let cancelled = lock_launches(&self.active_launches)
            .get(key)
            .is_some_and(|launch| launch.cancelled);
        info!(
            task_id = %task_id,
            pid = ?outcome.pid,
            exit_code = ?outcome.exit_code,
            duration_ms = outcome.duration_ms,
            cancelled = cancelled,
            "Game closed"
        );

        if cancelled {
            self.fail_task(task_id, "Game launch cancelled", TERMINATED_BY_USER);
            return;
        }
        match outcome.exit_code {
            Some(0) => self.complete_task(task_id, None),
            Some(code) => self.fail_task(
                task_id,
                "Game exited unexpectedly",
                &format!("exited with code {}", code),
            ),
            None => self.fail_task(task_id, "Game exited unexpectedly", "terminated by signal"),
        };
    }

    async fn relay_process_events(self, key: LaunchKey, mut events: mpsc::Receiver<ProcessEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                ProcessEvent::Spawned { pid } => {
                    debug!(launch = %key, pid = pid, "Game process spawned");
                    if let Some(launch) = lock_launches(&self.active_launches).get_mut(&key) {
                        launch.pid = Some(pid);
                    }
                }
                ProcessEvent::Output(line) => {
                    let _ = self.output.send(line);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::notify::BroadcastNotifier;
    use crate::application::registry::TaskRegistry;
    use crate::application::supervisor::SupervisorConfig;
    use crate::domain::{DomainError, NotificationKind, TaskStatus};
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::launcher::mocks::{MockLauncher, MOCK_PID};
    use crate::port::permission::mocks::MockNormalizer;
    use crate::port::time_provider::SystemTimeProvider;
    use crate::port::{LaunchError, OutputStream};
    use std::path::PathBuf;

    struct Fixture {
        supervisor: Supervisor,
        launcher: Arc<MockLauncher>,
        notifier: Arc<BroadcastNotifier>,
    }

    fn fixture(launcher: MockLauncher) -> Fixture {
        let launcher = Arc::new(launcher);
        let notifier = Arc::new(BroadcastNotifier::new());
        let registry = Arc::new(TaskRegistry::new(
            Arc::new(SequentialIdProvider::new("task")),
            Arc::new(SystemTimeProvider),
        ));
        let supervisor = Supervisor::new(
            registry,
            launcher.clone(),
            Arc::new(MockNormalizer::new_done()),
            notifier.clone(),
            Arc::new(SequentialIdProvider::new("notification")),
            SupervisorConfig::default(),
        );
        Fixture {
            supervisor,
            launcher,
            notifier,
        }
    }

    fn game() -> (GameVersion, Installation) {
        (
            GameVersion::new("1.19.8", "/opt/vs/1.19.8"),
            Installation::new("default", "/home/player/.vs/default").with_start_params("--tracelog"),
        )
    }

    #[tokio::test]
    async fn test_clean_exit_completes_task() {
        let f = fixture(MockLauncher::new_exit(0));
        let (version, installation) = game();

        let report = f.supervisor.execute_game(&version, &installation).await.unwrap();

        assert_eq!(report.outcome.exit_code, Some(0));
        let task = f.supervisor.registry().get(&report.task_id).unwrap();
        assert_eq!(task.task_type, TaskType::GameLaunch);
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(!f.supervisor.is_launch_active(&version, &installation));

        let request = &f.launcher.requests()[0];
        assert_eq!(request.executable_root, PathBuf::from("/opt/vs/1.19.8"));
        assert_eq!(request.data_path, PathBuf::from("/home/player/.vs/default"));
        assert_eq!(request.start_params, "--tracelog");
        assert_eq!(request.task_id, report.task_id);
    }

    #[tokio::test]
    async fn test_crash_still_resolves_but_fails_task() {
        let f = fixture(MockLauncher::new_exit(134));
        let mut notifications = f.notifier.subscribe();
        let (version, installation) = game();

        let report = f.supervisor.execute_game(&version, &installation).await.unwrap();

        assert_eq!(report.outcome.exit_code, Some(134));
        let task = f.supervisor.registry().get(&report.task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("exited with code 134"));

        let notification = notifications.recv().await.unwrap();
        assert_eq!(notification.kind, NotificationKind::Error);
        assert!(notifications.try_recv().is_err(), "exactly one notification");
    }

    #[tokio::test]
    async fn test_launch_error_is_surfaced_and_task_failed() {
        let f = fixture(MockLauncher::new_fail(LaunchError::UnsupportedPlatform(
            "macos".to_string(),
        )));
        let (version, installation) = game();

        let result = f.supervisor.execute_game(&version, &installation).await;

        assert!(matches!(
            result,
            Err(AppError::Launch(LaunchError::UnsupportedPlatform(_)))
        ));
        assert_eq!(f.launcher.launch_count(), 0);
        let tasks = f.supervisor.registry().list();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Failed);
        assert!(!f.supervisor.is_launch_active(&version, &installation));
    }

    #[tokio::test]
    async fn test_concurrent_launch_for_same_pair_is_rejected() {
        let f = fixture(MockLauncher::new_blocking());
        let (version, installation) = game();

        let first = {
            let supervisor = f.supervisor.clone();
            let (version, installation) = (version.clone(), installation.clone());
            tokio::spawn(async move { supervisor.execute_game(&version, &installation).await })
        };

        // Wait until the first launch holds the slot
        while !f.supervisor.is_launch_active(&version, &installation) {
            tokio::task::yield_now().await;
        }

        let second = f.supervisor.execute_game(&version, &installation).await;
        assert!(matches!(second, Err(AppError::LaunchAlreadyInProgress(_))));

        f.launcher.release();
        let report = first.await.unwrap().unwrap();
        assert_eq!(report.outcome.exit_code, Some(0));
        assert_eq!(f.launcher.launch_count(), 1);
        // The rejected call created no task
        assert_eq!(f.supervisor.registry().list().len(), 1);

        // The slot is free again
        f.launcher.release();
        assert!(f.supervisor.execute_game(&version, &installation).await.is_ok());
    }

    #[tokio::test]
    async fn test_different_installations_launch_independently() {
        let f = fixture(MockLauncher::new_exit(0));
        let version = GameVersion::new("1.19.8", "/opt/vs/1.19.8");
        let a = Installation::new("a", "/data/a");
        let b = Installation::new("b", "/data/b");

        let (ra, rb) = tokio::join!(
            f.supervisor.execute_game(&version, &a),
            f.supervisor.execute_game(&version, &b)
        );
        let ra = tokio_test::assert_ok!(ra);
        let rb = tokio_test::assert_ok!(rb);
        assert_ne!(ra.task_id, rb.task_id);
        assert_eq!(f.launcher.launch_count(), 2);
    }

    #[tokio::test]
    async fn test_cancel_forces_failed_state() {
        let f = fixture(MockLauncher::new_blocking());
        let (version, installation) = game();

        let running = {
            let supervisor = f.supervisor.clone();
            let (version, installation) = (version.clone(), installation.clone());
            tokio::spawn(async move { supervisor.execute_game(&version, &installation).await })
        };

        // Wait for the Spawned event to be relayed
        loop {
            match f.supervisor.cancel_launch(&version, &installation).await {
                Ok(true) => break,
                Ok(false) | Err(AppError::NotFound(_)) => tokio::task::yield_now().await,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        let report = running.await.unwrap().unwrap();
        assert!(f.launcher.was_terminated());
        assert_eq!(report.outcome.pid, Some(MOCK_PID));

        let task = f.supervisor.registry().get(&report.task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some(TERMINATED_BY_USER));
    }

    #[tokio::test]
    async fn test_failed_terminate_leaves_launch_running() {
        let f = fixture(MockLauncher::new_blocking().with_terminate_error(
            LaunchError::Terminate("EPERM".to_string()),
        ));
        let mut notifications = f.notifier.subscribe();
        let (version, installation) = game();

        let running = {
            let supervisor = f.supervisor.clone();
            let (version, installation) = (version.clone(), installation.clone());
            tokio::spawn(async move { supervisor.execute_game(&version, &installation).await })
        };

        let err = loop {
            match f.supervisor.cancel_launch(&version, &installation).await {
                Ok(false) | Err(AppError::NotFound(_)) => tokio::task::yield_now().await,
                Ok(true) => panic!("terminate should have failed"),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, AppError::Launch(LaunchError::Terminate(_))));

        let task = f.supervisor.registry().list().remove(0);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.error.is_none());
        assert!(f.supervisor.is_launch_active(&version, &installation));
        assert!(matches!(
            f.supervisor.registry().remove(&task.id),
            Err(DomainError::TaskStillRunning(_))
        ));
        assert!(notifications.try_recv().is_err());

        // The game later closes on its own and settles normally
        f.launcher.release();
        let report = running.await.unwrap().unwrap();
        let task = f.supervisor.registry().get(&report.task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_abandon_launch() {
        let f = fixture(MockLauncher::new_blocking());
        let (version, installation) = game();

        let caller = {
            let supervisor = f.supervisor.clone();
            let (version, installation) = (version.clone(), installation.clone());
            tokio::spawn(async move { supervisor.execute_game(&version, &installation).await })
        };
        while f.launcher.launch_count() == 0 {
            tokio::task::yield_now().await;
        }
        caller.abort();
        let _ = caller.await;

        // Still supervised: slot held, task running
        assert!(f.supervisor.is_launch_active(&version, &installation));
        let task_id = f.supervisor.registry().list()[0].id.clone();
        assert_eq!(
            f.supervisor.registry().get(&task_id).unwrap().status,
            TaskStatus::InProgress
        );

        f.launcher.release();
        while f.supervisor.is_launch_active(&version, &installation) {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            f.supervisor.registry().get(&task_id).unwrap().status,
            TaskStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_cancel_without_active_launch() {
        let f = fixture(MockLauncher::new_exit(0));
        let (version, installation) = game();

        let result = f.supervisor.cancel_launch(&version, &installation).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_output_is_rebroadcast() {
        let f = fixture(
            MockLauncher::new_exit(0)
                .with_output(OutputStream::Stdout, "Loading assets")
                .with_output(OutputStream::Stderr, "Missing texture"),
        );
        let mut output = f.supervisor.subscribe_output();
        let (version, installation) = game();

        let report = f.supervisor.execute_game(&version, &installation).await.unwrap();

        let first = output.recv().await.unwrap();
        assert_eq!(first.line, "Loading assets");
        assert_eq!(first.stream, OutputStream::Stdout);
        assert_eq!(first.task_id, report.task_id);
        let second = output.recv().await.unwrap();
        assert_eq!(second.stream, OutputStream::Stderr);
    }
}
