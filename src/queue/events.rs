//! Outbound match notifications

use crate::error::Result;
use crate::session::MatchPlayers;
use crate::types::{ConnectionId, PublicQuestion, SessionId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A match as seen by one of its players
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFound {
    pub session_id: SessionId,
    pub level: u32,
    pub questions: Vec<PublicQuestion>,
    pub players: MatchPlayers,
}

/// Trait for pushing match events to connected players
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Deliver a match to a push connection. Returns false when the
    /// connection is no longer open.
    async fn publish_match_found(&self, connection: ConnectionId, event: MatchFound)
        -> Result<bool>;
}

/// Mock event publisher for testing
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: std::sync::Mutex<Vec<(ConnectionId, MatchFound)>>,
    reject_deliveries: bool,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher whose connections are all gone
    pub fn disconnected() -> Self {
        Self {
            reject_deliveries: true,
            ..Self::default()
        }
    }

    /// Get all delivered events (for testing)
    pub fn get_published_events(&self) -> Vec<(ConnectionId, MatchFound)> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish_match_found(
        &self,
        connection: ConnectionId,
        event: MatchFound,
    ) -> Result<bool> {
        if self.reject_deliveries {
            return Ok(false);
        }
        if let Ok(mut events) = self.published_events.lock() {
            events.push((connection, event));
        }
        Ok(true)
    }
}
