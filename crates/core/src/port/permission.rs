// Permission Normalizer Port
// Recursive chmod of a set of roots, run off the control path

use crate::port::background_job::ProgressReporter;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Ephemeral input: roots plus the mode applied to everything beneath them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionJob {
    pub paths: Vec<PathBuf>,
    /// Unix permission bits (e.g. 0o755)
    pub mode: u32,
}

impl PermissionJob {
    pub fn new(paths: Vec<PathBuf>, mode: u32) -> Self {
        Self { paths, mode }
    }
}

/// I/O error on one entry; the rest of the walk continues
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}: {message}", .path.display())]
pub struct WalkError {
    pub path: PathBuf,
    pub message: String,
}

impl WalkError {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Single terminal signal of a permission walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkSignal {
    Done,
    /// Every collected error, in the order encountered
    Failed(Vec<WalkError>),
}

#[async_trait]
pub trait PermissionNormalizer: Send + Sync {
    /// Apply `job.mode` post-order to every entry under each root.
    ///
    /// Missing roots are skipped. Errors never abort sibling roots; they are
    /// collected and returned in `WalkSignal::Failed` after all roots ran.
    /// Progress is reported once per finished root.
    async fn normalize(&self, job: PermissionJob, progress: ProgressReporter) -> WalkSignal;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Mock normalizer returning a fixed signal
    pub struct MockNormalizer {
        signal: WalkSignal,
        jobs: Mutex<Vec<PermissionJob>>,
    }

    impl MockNormalizer {
        pub fn new(signal: WalkSignal) -> Self {
            Self {
                signal,
                jobs: Mutex::new(Vec::new()),
            }
        }

        pub fn new_done() -> Self {
            Self::new(WalkSignal::Done)
        }

        pub fn jobs(&self) -> Vec<PermissionJob> {
            self.jobs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PermissionNormalizer for MockNormalizer {
        async fn normalize(&self, job: PermissionJob, progress: ProgressReporter) -> WalkSignal {
            let total = job.paths.len().max(1);
            for index in 0..job.paths.len() {
                progress.report((index + 1) as f64 / total as f64 * 100.0);
            }
            self.jobs.lock().unwrap().push(job);
            self.signal.clone()
        }
    }
}
