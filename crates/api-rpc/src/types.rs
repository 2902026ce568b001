//! RPC Request/Response Types
//!
//! JSON-RPC method parameters and results.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use vsl_core::domain::{GameVersion, Installation, Task, TaskId, TaskType};

/// game.execute.v1 / game.cancel.v1 - Identify a launch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRequest {
    pub version: GameVersion,
    pub installation: Installation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteGameResponse {
    pub launched: bool,
    pub task_id: TaskId,
    /// None when the game was terminated by a signal
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelGameResponse {
    pub cancelled: bool,
}

/// task.create.v1 - Register externally driven work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub task_type: TaskType,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    pub task_id: TaskId,
}

/// task.progress.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProgressRequest {
    pub task_id: TaskId,
    pub percent: f64,
}

/// task.complete.v1 / task.remove.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskIdRequest {
    pub task_id: TaskId,
}

/// task.fail.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailTaskRequest {
    pub task_id: TaskId,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Result of a transition request; `applied` is false for no-ops
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub applied: bool,
    pub task: Option<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveTaskResponse {
    pub removed: Task,
}

/// task.list.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<Task>,
}

/// task.clear.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearTasksResponse {
    pub cleared: usize,
}

/// fs.change_perms.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePermsRequest {
    pub paths: Vec<PathBuf>,
    pub mode: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobResult {
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePermsResponse {
    pub task_id: TaskId,
    pub result: JobResult,
    pub error: Option<String>,
}
