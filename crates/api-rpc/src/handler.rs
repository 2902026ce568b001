//! RPC Method Handlers
//!
//! Thin adapters from JSON-RPC params onto the Supervisor and TaskRegistry.

use crate::error::to_rpc_error;
use crate::types::{
    CancelGameResponse, ChangePermsRequest, ChangePermsResponse, ClearTasksResponse,
    CreateTaskRequest, CreateTaskResponse, ExecuteGameResponse, FailTaskRequest, GameRequest,
    JobResult, ListTasksResponse, RemoveTaskResponse, TaskIdRequest, TaskResponse,
    UpdateProgressRequest,
};
use jsonrpsee::types::ErrorObjectOwned;
use tracing::info;
use vsl_core::application::{JobOutcome, Supervisor};
use vsl_core::error::AppError;

/// Highest accepted permission value (setuid/setgid/sticky + rwx for all)
const MAX_MODE: u32 = 0o7777;

/// RPC Handler with injected dependencies
#[derive(Clone)]
pub struct RpcHandler {
    supervisor: Supervisor,
}

impl RpcHandler {
    pub fn new(supervisor: Supervisor) -> Self {
        Self { supervisor }
    }

    /// game.execute.v1
    ///
    /// Resolves when the game exits. A dropped client connection does not
    /// abandon the child process; the supervisor keeps watching it.
    pub async fn execute_game(
        &self,
        params: GameRequest,
    ) -> Result<ExecuteGameResponse, ErrorObjectOwned> {
        if params.version.path.as_os_str().is_empty() {
            return Err(to_rpc_error(AppError::Validation(
                "version.path must not be empty".to_string(),
            )));
        }

        let report = self
            .supervisor
            .execute_game(&params.version, &params.installation)
            .await
            .map_err(to_rpc_error)?;

        Ok(ExecuteGameResponse {
            launched: true,
            task_id: report.task_id,
            exit_code: report.outcome.exit_code,
        })
    }

    /// game.cancel.v1
    pub async fn cancel_game(
        &self,
        params: GameRequest,
    ) -> Result<CancelGameResponse, ErrorObjectOwned> {
        let cancelled = self
            .supervisor
            .cancel_launch(&params.version, &params.installation)
            .await
            .map_err(to_rpc_error)?;
        Ok(CancelGameResponse { cancelled })
    }

    /// task.create.v1
    pub fn create_task(
        &self,
        params: CreateTaskRequest,
    ) -> Result<CreateTaskResponse, ErrorObjectOwned> {
        if params.description.trim().is_empty() {
            return Err(to_rpc_error(AppError::Validation(
                "description must not be empty".to_string(),
            )));
        }
        let task_id = self
            .supervisor
            .registry()
            .create_task(params.task_type, params.description);
        Ok(CreateTaskResponse { task_id })
    }

    /// task.progress.v1
    pub fn update_progress(&self, params: UpdateProgressRequest) -> TaskResponse {
        let registry = self.supervisor.registry();
        let applied = registry.update_progress(&params.task_id, params.percent);
        TaskResponse {
            applied,
            task: registry.get(&params.task_id),
        }
    }

    /// task.complete.v1
    pub fn complete_task(&self, params: TaskIdRequest) -> TaskResponse {
        let applied = self.supervisor.complete_task(&params.task_id, None);
        TaskResponse {
            applied,
            task: self.supervisor.registry().get(&params.task_id),
        }
    }

    /// task.fail.v1
    pub fn fail_task(&self, params: FailTaskRequest) -> TaskResponse {
        let reason = params.reason.unwrap_or_else(|| "failed".to_string());
        let applied = self
            .supervisor
            .fail_task(&params.task_id, "Task failed", &reason);
        TaskResponse {
            applied,
            task: self.supervisor.registry().get(&params.task_id),
        }
    }

    /// task.remove.v1
    pub fn remove_task(
        &self,
        params: TaskIdRequest,
    ) -> Result<RemoveTaskResponse, ErrorObjectOwned> {
        let removed = self
            .supervisor
            .registry()
            .remove(&params.task_id)
            .map_err(|e| to_rpc_error(e.into()))?;
        Ok(RemoveTaskResponse { removed })
    }

    /// task.list.v1
    pub fn list_tasks(&self) -> ListTasksResponse {
        ListTasksResponse {
            tasks: self.supervisor.registry().list(),
        }
    }

    /// task.clear.v1
    pub fn clear_tasks(&self) -> ClearTasksResponse {
        ClearTasksResponse {
            cleared: self.supervisor.registry().clear_finished(),
        }
    }

    /// fs.change_perms.v1
    ///
    /// Resolves once the walk is finished; the task can be polled meanwhile.
    pub async fn change_perms(
        &self,
        params: ChangePermsRequest,
    ) -> Result<ChangePermsResponse, ErrorObjectOwned> {
        if params.mode > MAX_MODE {
            return Err(to_rpc_error(AppError::Validation(format!(
                "mode {:o} is out of range",
                params.mode
            ))));
        }
        let ticket = self
            .supervisor
            .change_permissions(params.paths, params.mode);
        let task_id = ticket.task_id.clone();
        info!(task_id = %task_id, "Permission job submitted");

        let (result, error) = match ticket.wait().await {
            JobOutcome::Done => (JobResult::Done, None),
            JobOutcome::Failed(reason) => (JobResult::Failed, Some(reason)),
        };
        Ok(ChangePermsResponse {
            task_id,
            result,
            error,
        })
    }
}
