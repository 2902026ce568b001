// Application Layer - Task registry, supervision and notifications

pub mod constants;
pub mod notify;
pub mod registry;
pub mod supervisor;

// Re-exports
pub use notify::BroadcastNotifier;
pub use registry::{TaskEvent, TaskRegistry};
pub use supervisor::{JobOutcome, JobTicket, LaunchReport, Supervisor, SupervisorConfig};
