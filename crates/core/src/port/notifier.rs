// Notifier Port (user-facing notifications)

use crate::domain::Notification;

/// Delivery of user-facing notifications to the presentation layer
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}
