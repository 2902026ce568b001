//! JSON-RPC Server
//!
//! Serves the control surface over TCP on localhost.

use crate::handler::RpcHandler;
use crate::types::{
    ChangePermsRequest, CreateTaskRequest, FailTaskRequest, GameRequest, TaskIdRequest,
    UpdateProgressRequest,
};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use tracing::info;
use vsl_core::application::Supervisor;

pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9528;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: RpcHandler,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, supervisor: Supervisor) -> Self {
        Self {
            config,
            handler: RpcHandler::new(supervisor),
        }
    }

    /// Build the method table
    pub fn into_module(self) -> Result<RpcModule<()>, String> {
        let mut module = RpcModule::new(());

        // Game
        let handler = self.handler.clone();
        module
            .register_async_method("game.execute.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: GameRequest = params.parse()?;
                    handler.execute_game(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("game.cancel.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: GameRequest = params.parse()?;
                    handler.cancel_game(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        // Tasks
        let handler = self.handler.clone();
        module
            .register_async_method("task.create.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: CreateTaskRequest = params.parse()?;
                    handler.create_task(req)
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("task.progress.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: UpdateProgressRequest = params.parse()?;
                    Ok::<_, ErrorObjectOwned>(handler.update_progress(req))
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("task.complete.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: TaskIdRequest = params.parse()?;
                    Ok::<_, ErrorObjectOwned>(handler.complete_task(req))
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("task.fail.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: FailTaskRequest = params.parse()?;
                    Ok::<_, ErrorObjectOwned>(handler.fail_task(req))
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("task.remove.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: TaskIdRequest = params.parse()?;
                    handler.remove_task(req)
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("task.list.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { Ok::<_, ErrorObjectOwned>(handler.list_tasks()) }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("task.clear.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { Ok::<_, ErrorObjectOwned>(handler.clear_tasks()) }
            })
            .map_err(|e| e.to_string())?;

        // Filesystem
        let handler = self.handler.clone();
        module
            .register_async_method("fs.change_perms.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ChangePermsRequest = params.parse()?;
                    handler.change_perms(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        Ok(module)
    }

    /// Start the JSON-RPC server
    ///
    /// Security: binds to the configured host only (127.0.0.1 by default)
    pub async fn start(self) -> Result<(ServerHandle, SocketAddr), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let module = self.into_module()?;

        info!(addr = %local_addr, "JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok((handle, local_addr))
    }
}
