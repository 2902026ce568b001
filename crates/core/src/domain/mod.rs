// Domain Layer - Pure business logic and entities

pub mod error;
pub mod game;
pub mod notification;
pub mod task;

// Re-exports
pub use error::DomainError;
pub use game::{GameVersion, Installation, LaunchKey};
pub use notification::{Notification, NotificationKind};
pub use task::{Task, TaskId, TaskStatus, TaskType};
