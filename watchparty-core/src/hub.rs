use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::models::ConnectionId;
use crate::protocol::{Outbox, ServerEvent};

/// Message receiver for a client connection
pub type MessageReceiver = mpsc::Receiver<ServerEvent>;

/// Routes outbound events to connected clients.
///
/// Each connection gets a bounded queue. A client that stops draining its
/// queue loses messages instead of stalling the event loop; a client whose
/// queue is closed is dropped from the hub.
#[derive(Clone, Default)]
pub struct ConnectionHub {
    senders: Arc<DashMap<ConnectionId, mpsc::Sender<ServerEvent>>>,
}

impl ConnectionHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return the receiving end of its queue.
    pub fn register(&self, connection_id: ConnectionId, buffer: usize) -> MessageReceiver {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        debug!(connection_id = %connection_id, "Connection registered");
        self.senders.insert(connection_id, tx);
        rx
    }

    pub fn unregister(&self, connection_id: &ConnectionId) {
        if self.senders.remove(connection_id).is_some() {
            debug!(connection_id = %connection_id, "Connection unregistered");
        }
    }

    /// Queue one event. Returns false if it was not queued.
    pub fn send(&self, connection_id: &ConnectionId, event: ServerEvent) -> bool {
        let Some(sender) = self.senders.get(connection_id).map(|s| s.clone()) else {
            debug!(connection_id = %connection_id, event = event.name(), "No such connection, dropping event");
            return false;
        };

        match sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(
                    connection_id = %connection_id,
                    event = event.name(),
                    "Client outbound queue full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                info!(connection_id = %connection_id, "Client queue closed, removing connection");
                self.unregister(connection_id);
                false
            }
        }
    }

    /// Deliver an outbox in order. Returns the number of events queued.
    pub fn deliver(&self, outbox: Outbox) -> usize {
        outbox
            .into_iter()
            .map(|delivery| self.send(&delivery.connection_id, delivery.event))
            .filter(|queued| *queued)
            .count()
    }

    #[must_use]
    pub fn is_connected(&self, connection_id: &ConnectionId) -> bool {
        self.senders.contains_key(connection_id)
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.senders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_event(message: &str) -> ServerEvent {
        ServerEvent::RoomError {
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_deliver_routes_by_connection() {
        let hub = ConnectionHub::new();
        let a = ConnectionId::from("a");
        let b = ConnectionId::from("b");
        let mut rx_a = hub.register(a.clone(), 8);
        let mut rx_b = hub.register(b.clone(), 8);

        let mut outbox = Outbox::new();
        outbox.unicast(a.clone(), error_event("one"));
        outbox.to_many(vec![a.clone(), b.clone()], &error_event("two"));

        assert_eq!(hub.deliver(outbox), 3);
        assert_eq!(rx_a.recv().await, Some(error_event("one")));
        assert_eq!(rx_a.recv().await, Some(error_event("two")));
        assert_eq!(rx_b.recv().await, Some(error_event("two")));
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let hub = ConnectionHub::new();
        let a = ConnectionId::from("a");
        let mut rx = hub.register(a.clone(), 1);

        assert!(hub.send(&a, error_event("kept")));
        assert!(!hub.send(&a, error_event("dropped")));
        assert!(hub.is_connected(&a));
        assert_eq!(rx.recv().await, Some(error_event("kept")));
    }

    #[test]
    fn test_closed_queue_unregisters() {
        let hub = ConnectionHub::new();
        let a = ConnectionId::from("a");
        let rx = hub.register(a.clone(), 4);
        drop(rx);

        assert!(!hub.send(&a, error_event("gone")));
        assert!(!hub.is_connected(&a));
        assert_eq!(hub.connection_count(), 0);
    }
}
