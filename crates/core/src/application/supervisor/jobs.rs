// Background job orchestration (download / extract / compress / permission walk)

use super::Supervisor;
use crate::domain::{TaskId, TaskType};
use crate::port::{
    BackgroundJob, JobError, PermissionJob, PermissionNormalizer, ProgressReporter, WalkError,
    WalkSignal,
};
use async_trait::async_trait;
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::info;

/// Terminal signal of a background job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Done,
    Failed(String),
}

/// Handle to a submitted job: its task id plus the single terminal signal
#[derive(Debug)]
pub struct JobTicket {
    pub task_id: TaskId,
    outcome: oneshot::Receiver<JobOutcome>,
}

impl JobTicket {
    /// Wait for the job to finish
    pub async fn wait(self) -> JobOutcome {
        self.outcome
            .await
            .unwrap_or_else(|_| JobOutcome::Failed("job was dropped before finishing".to_string()))
    }
}

/// Adapts the permission normalizer to the generic job contract
struct PermissionNormalizeJob {
    normalizer: Arc<dyn PermissionNormalizer>,
    job: PermissionJob,
}

#[async_trait]
impl BackgroundJob for PermissionNormalizeJob {
    async fn run(self: Box<Self>, progress: ProgressReporter) -> Result<(), JobError> {
        let PermissionNormalizeJob { normalizer, job } = *self;
        match normalizer.normalize(job, progress).await {
            WalkSignal::Done => Ok(()),
            WalkSignal::Failed(errors) => Err(JobError::new(summarize_walk_errors(&errors))),
        }
    }
}

fn summarize_walk_errors(errors: &[WalkError]) -> String {
    match errors {
        [] => "permission change failed".to_string(),
        [only] => format!("could not change permissions of {}", only),
        [first, rest @ ..] => format!(
            "could not change permissions of {} (and {} more)",
            first,
            rest.len()
        ),
    }
}

/// Extract a readable message from a panic payload
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

impl Supervisor {
    /// Create a task for `job` and run the job on its own tokio task.
    ///
    /// Progress is relayed to the registry in emission order; the ticket
    /// resolves once with the terminal outcome. Failures are never retried.
    pub fn submit(
        &self,
        task_type: TaskType,
        description: impl Into<String>,
        job: Box<dyn BackgroundJob>,
    ) -> JobTicket {
        let description = description.into();
        let task_id = self.registry.create_task(task_type, description.clone());
        let (done_tx, done_rx) = oneshot::channel();

        let this = self.clone();
        let id = task_id.clone();
        tokio::spawn(async move {
            let outcome = this.drive_job(&id, task_type, &description, job).await;
            let _ = done_tx.send(outcome);
        });

        JobTicket {
            task_id,
            outcome: done_rx,
        }
    }

    /// Recursively apply `mode` to every path (post-order) off the control path
    pub fn change_permissions(&self, paths: Vec<PathBuf>, mode: u32) -> JobTicket {
        info!(paths = ?paths, mode = %format!("{:o}", mode), "Changing permissions");
        let description = format!("Applying mode {:o} to {} path(s)", mode, paths.len());
        let job = PermissionNormalizeJob {
            normalizer: Arc::clone(&self.normalizer),
            job: PermissionJob::new(paths, mode),
        };
        self.submit(TaskType::PermissionNormalize, description, Box::new(job))
    }

    async fn drive_job(
        &self,
        task_id: &str,
        task_type: TaskType,
        description: &str,
        job: Box<dyn BackgroundJob>,
    ) -> JobOutcome {
        let (reporter, mut progress) = ProgressReporter::channel();
        self.registry.start(task_id);

        // Isolated so a panicking job fails its task instead of the supervisor
        let worker = tokio::spawn(job.run(reporter));

        // Closes once the job drops its reporter (finished, failed or panicked)
        while let Some(percent) = progress.recv().await {
            self.registry.update_progress(task_id, percent);
        }

        let title = format!("{} failed", task_type);
        match worker.await {
            Ok(Ok(())) => {
                let done = format!("{} completed", task_type);
                self.complete_task(task_id, Some((done.as_str(), description)));
                JobOutcome::Done
            }
            Ok(Err(e)) => {
                let reason = e.to_string();
                self.fail_task(task_id, &title, &reason);
                JobOutcome::Failed(reason)
            }
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    format!("worker panicked: {}", panic_message(join_err.into_panic()))
                } else {
                    "worker cancelled".to_string()
                };
                self.fail_task(task_id, &title, &reason);
                JobOutcome::Failed(reason)
            }
        }
    }
}
