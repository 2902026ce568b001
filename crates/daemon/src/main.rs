//! VSL Supervisor - Main Entry Point
//! JSON-RPC control surface over the task registry and game supervisor

mod config;

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{DaemonConfig, LogFormat};
use vsl_api_rpc::{RpcServer, RpcServerConfig};
use vsl_core::application::{BroadcastNotifier, Supervisor, SupervisorConfig, TaskRegistry};
use vsl_core::domain::{Notification, NotificationKind};
use vsl_core::port::id_provider::UuidProvider;
use vsl_core::port::time_provider::SystemTimeProvider;
use vsl_infra_system::{GameProcessLauncher, HostPlatform, LauncherConfig, WalkdirNormalizer};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_logging(format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vsl=info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}

/// Log every user-facing notification until the notifier goes away
async fn log_notifications(mut rx: broadcast::Receiver<Notification>) {
    loop {
        match rx.recv().await {
            Ok(n) => match n.kind {
                NotificationKind::Error => error!(title = %n.title, body = %n.body, "Notification"),
                NotificationKind::Warning => warn!(title = %n.title, body = %n.body, "Notification"),
                NotificationKind::Success | NotificationKind::Info => {
                    info!(title = %n.title, body = %n.body, "Notification")
                }
            },
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped = skipped, "Notification logger lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration + logging
    let config = DaemonConfig::from_env()?;
    init_logging(config.log_format);

    let platform = HostPlatform::current();
    info!(platform = %platform, "VSL Supervisor v{} starting...", VERSION);

    // 2. DI wiring
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let notifier = Arc::new(BroadcastNotifier::new());
    tokio::spawn(log_notifications(notifier.subscribe()));
    let registry = Arc::new(TaskRegistry::new(
        id_provider.clone(),
        time_provider.clone(),
    ));

    let launcher = Arc::new(GameProcessLauncher::new(
        LauncherConfig {
            platform,
            interpreter: config.mono_path.clone(),
            terminate_grace_ms: config.terminate_grace_ms,
        },
        time_provider.clone(),
    ));

    let supervisor = Supervisor::new(
        registry,
        launcher,
        Arc::new(WalkdirNormalizer::new()),
        notifier,
        id_provider,
        SupervisorConfig {
            output_buffer: config.output_buffer,
        },
    );

    // 3. JSON-RPC server
    let rpc_config = RpcServerConfig {
        host: config.rpc_host.clone(),
        port: config.rpc_port,
    };
    let (rpc_handle, addr) = RpcServer::new(rpc_config, supervisor)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(addr = %addr, "System ready. Press Ctrl+C to shutdown");

    // 4. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    rpc_handle.stopped().await;

    info!("Shutdown complete.");
    Ok(())
}
