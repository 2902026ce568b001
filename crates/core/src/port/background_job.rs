// Background Job Port
// Long-running work (download, extract, compress, permission walk) bound to one task

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Failure reported by a background job; the message is user-facing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct JobError(pub String);

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Progress sink handed to a running job.
///
/// Reports are delivered to the supervisor in the order they are made.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<f64>,
}

impl ProgressReporter {
    /// Create a reporter and the receiving end the supervisor drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<f64>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Report progress in percent; silently dropped once nobody listens
    pub fn report(&self, percent: f64) {
        let _ = self.tx.send(percent);
    }
}

/// Background job trait
///
/// Codecs (HTTP download, zip/tar) implement this; the supervisor only
/// orchestrates them.
#[async_trait]
pub trait BackgroundJob: Send {
    /// Run the job to completion.
    ///
    /// Returning drops the reporter, which tells the supervisor that no more
    /// progress will arrive.
    async fn run(self: Box<Self>, progress: ProgressReporter) -> Result<(), JobError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;

    /// Job that reports a fixed progress sequence, then finishes
    pub struct ScriptedJob {
        steps: Vec<f64>,
        result: Result<(), JobError>,
        panic_message: Option<String>,
    }

    impl ScriptedJob {
        pub fn succeeding(steps: Vec<f64>) -> Self {
            Self {
                steps,
                result: Ok(()),
                panic_message: None,
            }
        }

        pub fn failing(steps: Vec<f64>, message: impl Into<String>) -> Self {
            Self {
                steps,
                result: Err(JobError::new(message)),
                panic_message: None,
            }
        }

        pub fn panicking(message: impl Into<String>) -> Self {
            Self {
                steps: Vec::new(),
                result: Ok(()),
                panic_message: Some(message.into()),
            }
        }
    }

    #[async_trait]
    impl BackgroundJob for ScriptedJob {
        async fn run(self: Box<Self>, progress: ProgressReporter) -> Result<(), JobError> {
            for step in &self.steps {
                progress.report(*step);
                tokio::task::yield_now().await;
            }
            if let Some(msg) = &self.panic_message {
                panic!("{}", msg); // Actually panic for panic isolation testing
            }
            self.result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reports_arrive_in_order() {
        let (reporter, mut rx) = ProgressReporter::channel();
        reporter.report(10.0);
        reporter.report(5.0);
        reporter.report(70.0);
        drop(reporter);

        let mut seen = Vec::new();
        while let Some(p) = rx.recv().await {
            seen.push(p);
        }
        assert_eq!(seen, vec![10.0, 5.0, 70.0]);
    }

    #[test]
    fn test_report_after_receiver_dropped_is_silent() {
        let (reporter, rx) = ProgressReporter::channel();
        drop(rx);
        reporter.report(50.0);
    }
}
