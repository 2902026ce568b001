// VSL Infrastructure - System Adapters
// Implements: ProcessLauncher, PermissionNormalizer

pub mod permission_walker;
pub mod platform;
pub mod process_launcher;
pub mod strategy;

pub use permission_walker::WalkdirNormalizer;
pub use platform::HostPlatform;
pub use process_launcher::{GameProcessLauncher, LauncherConfig};
pub use strategy::{select_strategy, LaunchCommand, LaunchStrategy};
