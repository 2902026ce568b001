//! JSON-RPC API Layer
//!
//! Control surface of the VSL supervisor: game launch, task registry and
//! permission jobs, exposed as JSON-RPC 2.0 methods to the launcher UI.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
