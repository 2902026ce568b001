//! Daemon configuration from `VSL_*` environment variables

use anyhow::{Context, Result};
use std::path::PathBuf;
use vsl_api_rpc::server::{DEFAULT_RPC_HOST, DEFAULT_RPC_PORT};
use vsl_core::application::constants::{DEFAULT_OUTPUT_BUFFER, DEFAULT_TERMINATE_GRACE_MS};

const DEFAULT_MONO_PATH: &str = "mono";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub rpc_host: String,
    pub rpc_port: u16,
    pub log_format: LogFormat,
    pub mono_path: PathBuf,
    pub terminate_grace_ms: i64,
    pub output_buffer: usize,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rpc_port = match lookup("VSL_RPC_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("VSL_RPC_PORT is not a port: {}", raw))?,
            None => DEFAULT_RPC_PORT,
        };

        let log_format = match lookup("VSL_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let mono_path = lookup("VSL_MONO_PATH")
            .map(|raw| shellexpand::tilde(&raw).into_owned())
            .unwrap_or_else(|| DEFAULT_MONO_PATH.to_string());

        let terminate_grace_ms = match lookup("VSL_TERMINATE_GRACE_MS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("VSL_TERMINATE_GRACE_MS is not a number: {}", raw))?,
            None => DEFAULT_TERMINATE_GRACE_MS,
        };

        let output_buffer = match lookup("VSL_OUTPUT_BUFFER") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("VSL_OUTPUT_BUFFER is not a number: {}", raw))?,
            None => DEFAULT_OUTPUT_BUFFER,
        };

        Ok(Self {
            rpc_host: lookup("VSL_RPC_HOST").unwrap_or_else(|| DEFAULT_RPC_HOST.to_string()),
            rpc_port,
            log_format,
            mono_path: PathBuf::from(mono_path),
            terminate_grace_ms,
            output_buffer,
        })
    }
}
