//! Registry of open push connections
//!
//! Each socket owns an unbounded channel drained by its writer task. The
//! registry maps connection ids to those channels so the matchmaker can
//! reach a waiting player without knowing about sockets.

use crate::error::{Result, TriviaError};
use crate::gateway::messages::ServerEvent;
use crate::metrics::MetricsCollector;
use crate::queue::{EventPublisher, MatchFound};
use crate::types::{ConnectionId, PlayerId};
use crate::utils::generate_connection_id;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

struct Connection {
    player_id: PlayerId,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

/// Open push connections by id
#[derive(Clone)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<ConnectionId, Connection>>>,
    metrics_collector: Arc<MetricsCollector>,
}

impl ConnectionRegistry {
    pub fn new(metrics_collector: Arc<MetricsCollector>) -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            metrics_collector,
        }
    }

    /// Register a new connection and return its id and event receiver
    pub fn open(
        &self,
        player_id: &PlayerId,
    ) -> Result<(ConnectionId, mpsc::UnboundedReceiver<ServerEvent>)> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection_id = generate_connection_id();

        let mut connections = self
            .connections
            .write()
            .map_err(|_| TriviaError::InternalError {
                message: "Failed to acquire connections write lock".to_string(),
            })?;
        connections.insert(
            connection_id,
            Connection {
                player_id: player_id.clone(),
                sender,
            },
        );
        self.metrics_collector
            .service()
            .push_connections
            .set(connections.len() as i64);

        debug!(
            "Push connection {} opened for player '{}'",
            connection_id, player_id
        );
        Ok((connection_id, receiver))
    }

    /// Drop a connection
    pub fn close(&self, connection_id: &ConnectionId) {
        if let Ok(mut connections) = self.connections.write() {
            if let Some(connection) = connections.remove(connection_id) {
                debug!(
                    "Push connection {} closed for player '{}'",
                    connection_id, connection.player_id
                );
            }
            self.metrics_collector
                .service()
                .push_connections
                .set(connections.len() as i64);
        }
    }

    /// Queue an event on a connection. Returns false if it is gone.
    pub fn send(&self, connection_id: &ConnectionId, event: ServerEvent) -> Result<bool> {
        let connections = self
            .connections
            .read()
            .map_err(|_| TriviaError::InternalError {
                message: "Failed to acquire connections read lock".to_string(),
            })?;

        let name = event.name();
        let delivered = connections
            .get(connection_id)
            .is_some_and(|c| c.sender.send(event).is_ok());
        self.metrics_collector.record_push_event(name, delivered);
        Ok(delivered)
    }

    /// Number of open connections
    pub fn len(&self) -> usize {
        self.connections.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventPublisher for ConnectionRegistry {
    async fn publish_match_found(
        &self,
        connection: ConnectionId,
        event: MatchFound,
    ) -> Result<bool> {
        self.send(&connection, ServerEvent::Found(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_send_reaches_open_connection() {
        let registry = ConnectionRegistry::new(Arc::new(MetricsCollector::default()));
        let (id, mut receiver) = registry.open(&"alice".to_string()).unwrap();

        assert!(registry.send(&id, ServerEvent::Cancelled).unwrap());
        assert!(matches!(receiver.recv().await, Some(ServerEvent::Cancelled)));

        registry.close(&id);
        assert!(registry.is_empty());
        assert!(!registry.send(&id, ServerEvent::Cancelled).unwrap());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_not_delivered() {
        let registry = ConnectionRegistry::new(Arc::new(MetricsCollector::default()));
        let (id, receiver) = registry.open(&"bob".to_string()).unwrap();
        drop(receiver);

        assert!(!registry.send(&id, ServerEvent::Cancelled).unwrap());
        assert!(!registry.send(&Uuid::new_v4(), ServerEvent::Cancelled).unwrap());
    }
}
