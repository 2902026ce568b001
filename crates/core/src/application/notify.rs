// Broadcast notifier: fans user-facing notifications out to subscribers

use crate::application::constants::NOTIFICATION_CHANNEL_CAPACITY;
use crate::domain::Notification;
use crate::port::Notifier;
use tokio::sync::broadcast;
use tracing::debug;

pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: Notification) {
        debug!(
            notification_id = %notification.id,
            kind = ?notification.kind,
            title = %notification.title,
            "Notification emitted"
        );
        let _ = self.tx.send(notification);
    }
}
