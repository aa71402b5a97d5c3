//! Connection registry
//!
//! Tracks which connections are live and holds the outbound queue for each
//! one. The registry never inspects event content; it only knows how to
//! reach a connection.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::mpsc;

use lp_protocol::{ConnectionId, ServerEvent};

/// Sending half of a connection's outbound queue
pub type OutboundSender = mpsc::Sender<ServerEvent>;

/// A live connection
pub struct ConnectionHandle {
    /// Connection identifier
    pub id: ConnectionId,
    /// When the connection was registered
    pub connected_at: Instant,
    /// Outbound queue drained by the transport's writer task
    tx: OutboundSender,
}

/// Registry of live connections indexed by connection ID
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    /// Register a connection. Returns false if the ID was already live, in
    /// which case the previous queue is replaced.
    pub fn register(&mut self, id: ConnectionId, tx: OutboundSender) -> bool {
        let handle = ConnectionHandle {
            id: id.clone(),
            connected_at: Instant::now(),
            tx,
        };
        self.connections.insert(id, handle).is_none()
    }

    /// Remove a connection, dropping its outbound queue
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<ConnectionHandle> {
        self.connections.remove(id)
    }

    /// Whether the connection is currently registered
    pub fn is_live(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Queue an event for a single connection.
    ///
    /// Never waits: a full queue drops the event.
    pub fn send_to(&self, id: &ConnectionId, event: ServerEvent) -> bool {
        match self.connections.get(id) {
            Some(handle) => deliver(handle, event),
            None => {
                tracing::debug!("Not sending {} to unknown connection {}", event.name(), id);
                false
            }
        }
    }

    /// Queue an event for every live connection. Returns how many accepted it.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        self.connections
            .values()
            .filter(|handle| deliver(handle, event.clone()))
            .count()
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if no connections are live
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

fn deliver(handle: &ConnectionHandle, event: ServerEvent) -> bool {
    match handle.tx.try_send(event) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(event)) => {
            tracing::warn!(
                "Outbound queue full for {}, dropping {}",
                handle.id,
                event.name()
            );
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            tracing::debug!("Outbound queue closed for {}", handle.id);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_unregister() {
        let mut registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(4);
        let id = ConnectionId::new("c1");

        assert!(registry.register(id.clone(), tx));
        assert!(registry.is_live(&id));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(&id).is_some());
        assert!(!registry.is_live(&id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_twice_replaces() {
        let mut registry = ConnectionRegistry::new();
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);
        let id = ConnectionId::new("c1");

        assert!(registry.register(id.clone(), tx1));
        assert!(!registry.register(id, tx2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_send_to_single_connection() {
        let mut registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        registry.register(ConnectionId::new("c1"), tx1);
        registry.register(ConnectionId::new("c2"), tx2);

        assert!(registry.send_to(&ConnectionId::new("c1"), ServerEvent::PollEnded));

        assert_eq!(rx1.try_recv().unwrap(), ServerEvent::PollEnded);
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_send_to_unknown_connection() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.send_to(&ConnectionId::new("ghost"), ServerEvent::PollEnded));
    }

    #[test]
    fn test_broadcast_reaches_everyone() {
        let mut registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        registry.register(ConnectionId::new("c1"), tx1);
        registry.register(ConnectionId::new("c2"), tx2);

        assert_eq!(registry.broadcast(&ServerEvent::PollEnded), 2);
        assert_eq!(rx1.try_recv().unwrap(), ServerEvent::PollEnded);
        assert_eq!(rx2.try_recv().unwrap(), ServerEvent::PollEnded);
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let mut registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::channel(1);
        let id = ConnectionId::new("slow");
        registry.register(id.clone(), tx);

        assert!(registry.send_to(&id, ServerEvent::PollEnded));
        assert!(!registry.send_to(&id, ServerEvent::PollEnded));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_queue_is_skipped() {
        let mut registry = ConnectionRegistry::new();
        let (tx, rx) = mpsc::channel(1);
        registry.register(ConnectionId::new("gone"), tx);
        drop(rx);

        assert_eq!(registry.broadcast(&ServerEvent::PollEnded), 0);
    }
}
