// Port Layer - Interfaces for external dependencies

pub mod background_job;
pub mod id_provider; // For deterministic testing
pub mod launcher;
pub mod notifier;
pub mod permission;
pub mod time_provider;

// Re-exports
pub use background_job::{BackgroundJob, JobError, ProgressReporter};
pub use id_provider::IdProvider;
pub use launcher::{
    LaunchError, LaunchOutcome, LaunchRequest, OutputLine, OutputStream, ProcessEvent,
    ProcessLauncher,
};
pub use notifier::Notifier;
pub use permission::{PermissionJob, PermissionNormalizer, WalkError, WalkSignal};
pub use time_provider::TimeProvider;
