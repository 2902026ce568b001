// Supervisor - binds each task to exactly one worker and relays its events
//
// Workers are either a game process (ProcessLauncher) or a background job
// (BackgroundJob / PermissionNormalizer). Worker events become registry
// transitions here and nowhere else.

mod jobs;
mod launch;

pub use jobs::{JobOutcome, JobTicket};
pub use launch::LaunchReport;

use crate::application::constants::DEFAULT_OUTPUT_BUFFER;
use crate::application::registry::TaskRegistry;
use crate::domain::{LaunchKey, Notification, NotificationKind, TaskId};
use crate::port::{IdProvider, Notifier, OutputLine, PermissionNormalizer, ProcessLauncher};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{error, info};

/// Supervisor tuning
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Capacity of the per-launch side channel for output lines
    pub output_buffer: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            output_buffer: DEFAULT_OUTPUT_BUFFER,
        }
    }
}

/// A launch currently holding its single-flight slot
#[derive(Debug, Default)]
struct ActiveLaunch {
    task_id: Option<TaskId>,
    pid: Option<u32>,
    /// Set while a terminate request is in flight or after it was delivered
    cancelled: bool,
}

type ActiveLaunches = Arc<Mutex<HashMap<LaunchKey, ActiveLaunch>>>;

fn lock_launches(launches: &ActiveLaunches) -> MutexGuard<'_, HashMap<LaunchKey, ActiveLaunch>> {
    launches.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Supervisor / dispatcher (cheap to clone; all state is shared)
#[derive(Clone)]
pub struct Supervisor {
    registry: Arc<TaskRegistry>,
    launcher: Arc<dyn ProcessLauncher>,
    normalizer: Arc<dyn PermissionNormalizer>,
    notifier: Arc<dyn Notifier>,
    id_provider: Arc<dyn IdProvider>,
    active_launches: ActiveLaunches,
    output: broadcast::Sender<OutputLine>,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(
        registry: Arc<TaskRegistry>,
        launcher: Arc<dyn ProcessLauncher>,
        normalizer: Arc<dyn PermissionNormalizer>,
        notifier: Arc<dyn Notifier>,
        id_provider: Arc<dyn IdProvider>,
        config: SupervisorConfig,
    ) -> Self {
        let (output, _) = broadcast::channel(config.output_buffer.max(1));
        Self {
            registry,
            launcher,
            normalizer,
            notifier,
            id_provider,
            active_launches: Arc::new(Mutex::new(HashMap::new())),
            output,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Stream of game stdout/stderr lines from every running launch
    pub fn subscribe_output(&self) -> broadcast::Receiver<OutputLine> {
        self.output.subscribe()
    }

    /// Fail a task and emit exactly one error notification.
    ///
    /// Nothing happens if the task already reached a terminal state; returns
    /// whether this call made the transition.
    pub fn fail_task(&self, task_id: &str, title: &str, reason: &str) -> bool {
        if !self.registry.fail_with_reason(task_id, reason) {
            return false;
        }
        error!(task_id = %task_id, reason = %reason, "Task failed");
        self.notifier.notify(Notification::new(
            self.id_provider.generate_id(),
            NotificationKind::Error,
            title,
            reason,
        ));
        true
    }

    /// Complete a task; `announce` adds a success notification
    pub fn complete_task(&self, task_id: &str, announce: Option<(&str, &str)>) -> bool {
        if !self.registry.complete(task_id) {
            return false;
        }
        info!(task_id = %task_id, "Task completed");
        if let Some((title, body)) = announce {
            self.notifier.notify(Notification::new(
                self.id_provider.generate_id(),
                NotificationKind::Success,
                title,
                body,
            ));
        }
        true
    }
}
