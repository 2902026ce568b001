// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task {0} is still running")]
    TaskStillRunning(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
