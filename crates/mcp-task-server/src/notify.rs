//! `resources/listChanged` and job-progress fan-out (spec.md §4.6/§5:
//! after-commit, best-effort, delivery failures logged at debug only).

use mcp_protocol::mcp::ServerNotification;
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 256;

/// Thin wrapper over a broadcast channel. Every attached HTTP SSE session
/// subscribes; the STDIO transport also drains it (both best-effort).
pub struct ChangeBus {
    sender: broadcast::Sender<ServerNotification>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerNotification> {
        self.sender.subscribe()
    }

    /// Best-effort publish: no receivers is the common case when nobody is
    /// attached yet, and is not an error.
    pub fn publish(&self, notification: ServerNotification) {
        if let Err(err) = self.sender.send(notification) {
            debug!(error = %err, "no subscribers for server notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = ChangeBus::new();
        let mut rx = bus.subscribe();
        bus.publish(ServerNotification::ResourcesListChanged);
        let received = rx.recv().await.unwrap();
        assert_eq!(received.method(), "notifications/resources/listChanged");
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = ChangeBus::new();
        bus.publish(ServerNotification::Heartbeat);
    }
}
