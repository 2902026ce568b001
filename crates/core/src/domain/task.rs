// Task Domain Model

use serde::{Deserialize, Serialize};

/// Task ID (UUID v4, unique for the process lifetime)
pub type TaskId = String;

/// Upper bound of the progress metric (percent)
pub const MAX_PROGRESS: f64 = 100.0;

/// Task Type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    Download,
    Extract,
    Compress,
    PermissionNormalize,
    GameLaunch,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::Download => write!(f, "download"),
            TaskType::Extract => write!(f, "extract"),
            TaskType::Compress => write!(f, "compress"),
            TaskType::PermissionNormalize => write!(f, "permission-normalize"),
            TaskType::GameLaunch => write!(f, "game-launch"),
        }
    }
}

/// Task Status
///
/// `Pending -> InProgress -> {Completed | Failed}`; `Pending` may be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Completed and Failed accept no transition except removal
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in-progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Task Entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub task_type: TaskType,
    pub description: String,
    pub status: TaskStatus,
    /// Percent in [0, 100]; meaningful only while in progress
    pub progress: f64,

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,

    /// Human-readable failure reason
    pub error: Option<String>,
}

impl Task {
    /// Create a new pending task
    ///
    /// # Arguments
    ///
    /// * `id` - Unique task ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `task_type` - Kind of background work
    /// * `description` - Human-readable description shown to observers
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        task_type: TaskType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            task_type,
            description: description.into(),
            status: TaskStatus::Pending,
            progress: 0.0,
            created_at,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transition Pending -> InProgress. Returns false when nothing changed.
    pub fn start(&mut self, now_millis: i64) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::InProgress;
        self.started_at = Some(now_millis);
        true
    }

    /// Apply a progress report.
    ///
    /// Starts a pending task, clamps to [0, 100] and never lowers the stored
    /// value. Terminal tasks and NaN reports are ignored. Returns true when the
    /// task changed.
    pub fn update_progress(&mut self, percent: f64, now_millis: i64) -> bool {
        if self.is_terminal() || percent.is_nan() {
            return false;
        }

        let started = self.start(now_millis);
        let clamped = percent.clamp(0.0, MAX_PROGRESS);
        if clamped > self.progress {
            self.progress = clamped;
            return true;
        }
        started
    }

    /// Transition to Completed. Idempotent: returns false if already terminal.
    pub fn complete(&mut self, now_millis: i64) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Completed;
        self.finished_at = Some(now_millis);
        true
    }

    /// Transition to Failed. Idempotent: returns false if already terminal.
    pub fn fail(&mut self, now_millis: i64, reason: Option<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Failed;
        self.finished_at = Some(now_millis);
        self.error = reason;
        true
    }
}
