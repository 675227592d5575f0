//! Session model and store
//!
//! A session moves `active -> completed` exactly once. Stat finalization is
//! tracked per player with a claim/commit protocol so that concurrent
//! finalization paths apply a player's stats at most once.

use crate::error::{Result, TriviaError};
use crate::types::{PlayerId, QuestionId, SessionId, SessionStatus};
use crate::utils::{current_timestamp, generate_session_id};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

/// A 1v1 game session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub level: u32,
    /// Seat 0 is the player who was waiting, seat 1 the joiner
    pub players: [PlayerId; 2],
    /// Canonical question order
    pub questions: Vec<QuestionId>,
    pub status: SessionStatus,
    pub stats_finalized: bool,
    /// Players whose stats have been applied
    pub stats_updated: BTreeSet<PlayerId>,
    /// Players whose finalization is in flight
    #[serde(skip)]
    pub finalization_claims: BTreeSet<PlayerId>,
    pub created_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a new active session
    pub fn new(players: [PlayerId; 2], level: u32, questions: Vec<QuestionId>) -> Self {
        let now = current_timestamp();
        Self {
            id: generate_session_id(),
            level,
            players,
            questions,
            status: SessionStatus::Active,
            stats_finalized: false,
            stats_updated: BTreeSet::new(),
            finalization_claims: BTreeSet::new(),
            created_at: now,
            started_at: now,
            finished_at: None,
        }
    }

    pub fn is_participant(&self, player_id: &PlayerId) -> bool {
        self.players.contains(player_id)
    }

    /// Seat index of a participant
    pub fn seat_of(&self, player_id: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p == player_id)
    }

    pub fn opponent_of(&self, player_id: &PlayerId) -> Option<&PlayerId> {
        self.seat_of(player_id).map(|seat| &self.players[1 - seat])
    }

    pub fn contains_question(&self, question_id: &QuestionId) -> bool {
        self.questions.contains(question_id)
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Result of trying to claim a player's finalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizationClaim {
    /// Caller owns the finalization and must commit or release it
    Claimed,
    /// Stats for this player were already applied
    AlreadyApplied,
    /// Another caller holds the claim
    InProgress,
    /// Session has not completed yet
    NotCompleted,
}

/// Aggregate session counts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStoreStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub completed_sessions: usize,
    pub finalized_sessions: usize,
}

/// Trait for session persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a newly created session
    async fn insert(&self, session: Session) -> Result<()>;

    /// Get a session by ID
    async fn get(&self, session_id: &SessionId) -> Result<Option<Session>>;

    /// Transition `active -> completed`. Only one caller ever sees `true`.
    async fn complete_if_active(
        &self,
        session_id: &SessionId,
        finished_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Claim the right to apply a player's stats for a completed session
    async fn claim_finalization(
        &self,
        session_id: &SessionId,
        player_id: &PlayerId,
    ) -> Result<FinalizationClaim>;

    /// Record a player's stats as applied. Returns true when this made the
    /// session fully finalized.
    async fn commit_finalization(&self, session_id: &SessionId, player_id: &PlayerId)
        -> Result<bool>;

    /// Drop a claim after a failed apply so a later attempt can retry
    async fn release_finalization(&self, session_id: &SessionId, player_id: &PlayerId)
        -> Result<()>;

    /// Completed sessions whose stats are not yet fully applied
    async fn pending_finalization(&self, limit: usize) -> Result<Vec<SessionId>>;

    /// Aggregate counts
    async fn stats(&self) -> Result<SessionStoreStats>;
}

/// In-memory session store
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_lock(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<SessionId, Session>>> {
        self.sessions.write().map_err(|_| {
            TriviaError::InternalError {
                message: "Failed to acquire sessions write lock".to_string(),
            }
            .into()
        })
    }

    fn read_lock(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<SessionId, Session>>> {
        self.sessions.read().map_err(|_| {
            TriviaError::InternalError {
                message: "Failed to acquire sessions read lock".to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: Session) -> Result<()> {
        let mut sessions = self.write_lock()?;
        if sessions.contains_key(&session.id) {
            return Err(TriviaError::InternalError {
                message: format!("Session {} already exists", session.id),
            }
            .into());
        }
        sessions.insert(session.id, session);
        Ok(())
    }

    async fn get(&self, session_id: &SessionId) -> Result<Option<Session>> {
        Ok(self.read_lock()?.get(session_id).cloned())
    }

    async fn complete_if_active(
        &self,
        session_id: &SessionId,
        finished_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut sessions = self.write_lock()?;
        let session = sessions
            .get_mut(session_id)
            .ok_or(TriviaError::SessionNotFound {
                session_id: *session_id,
            })?;

        if session.status != SessionStatus::Active {
            return Ok(false);
        }
        session.status = SessionStatus::Completed;
        session.finished_at = Some(finished_at);
        Ok(true)
    }

    async fn claim_finalization(
        &self,
        session_id: &SessionId,
        player_id: &PlayerId,
    ) -> Result<FinalizationClaim> {
        let mut sessions = self.write_lock()?;
        let session = sessions
            .get_mut(session_id)
            .ok_or(TriviaError::SessionNotFound {
                session_id: *session_id,
            })?;

        if !session.is_participant(player_id) {
            return Err(TriviaError::NotAParticipant {
                player_id: player_id.clone(),
                session_id: *session_id,
            }
            .into());
        }
        if session.status != SessionStatus::Completed {
            return Ok(FinalizationClaim::NotCompleted);
        }
        if session.stats_finalized || session.stats_updated.contains(player_id) {
            return Ok(FinalizationClaim::AlreadyApplied);
        }
        if !session.finalization_claims.insert(player_id.clone()) {
            return Ok(FinalizationClaim::InProgress);
        }
        Ok(FinalizationClaim::Claimed)
    }

    async fn commit_finalization(
        &self,
        session_id: &SessionId,
        player_id: &PlayerId,
    ) -> Result<bool> {
        let mut sessions = self.write_lock()?;
        let session = sessions
            .get_mut(session_id)
            .ok_or(TriviaError::SessionNotFound {
                session_id: *session_id,
            })?;

        session.finalization_claims.remove(player_id);
        session.stats_updated.insert(player_id.clone());

        let all_applied = session
            .players
            .iter()
            .all(|p| session.stats_updated.contains(p));
        if all_applied && !session.stats_finalized {
            session.stats_finalized = true;
            return Ok(true);
        }
        Ok(false)
    }

    async fn release_finalization(
        &self,
        session_id: &SessionId,
        player_id: &PlayerId,
    ) -> Result<()> {
        let mut sessions = self.write_lock()?;
        if let Some(session) = sessions.get_mut(session_id) {
            session.finalization_claims.remove(player_id);
        }
        Ok(())
    }

    async fn pending_finalization(&self, limit: usize) -> Result<Vec<SessionId>> {
        let sessions = self.read_lock()?;
        let mut pending: Vec<&Session> = sessions
            .values()
            .filter(|s| s.status == SessionStatus::Completed && !s.stats_finalized)
            .collect();
        pending.sort_by_key(|s| s.finished_at);

        Ok(pending.into_iter().take(limit).map(|s| s.id).collect())
    }

    async fn stats(&self) -> Result<SessionStoreStats> {
        let sessions = self.read_lock()?;
        let mut stats = SessionStoreStats {
            total_sessions: sessions.len(),
            ..Default::default()
        };
        for session in sessions.values() {
            match session.status {
                SessionStatus::Active => stats.active_sessions += 1,
                SessionStatus::Completed => stats.completed_sessions += 1,
            }
            if session.stats_finalized {
                stats.finalized_sessions += 1;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn new_session() -> Session {
        Session::new(
            ["alice".to_string(), "bob".to_string()],
            1,
            (0..10).map(|_| Uuid::new_v4()).collect(),
        )
    }

    #[test]
    fn test_session_membership_helpers() {
        let session = new_session();
        let alice = "alice".to_string();
        let bob = "bob".to_string();

        assert!(session.is_active());
        assert_eq!(session.seat_of(&bob), Some(1));
        assert_eq!(session.opponent_of(&alice), Some(&bob));
        assert_eq!(session.opponent_of(&"carol".to_string()), None);
        assert!(session.contains_question(&session.questions[3]));
    }

    #[tokio::test]
    async fn test_completion_transitions_once() {
        let store = InMemorySessionStore::new();
        let session = new_session();
        let id = session.id;
        store.insert(session).await.unwrap();

        assert!(store.complete_if_active(&id, Utc::now()).await.unwrap());
        assert!(!store.complete_if_active(&id, Utc::now()).await.unwrap());

        let stored = store.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
        assert!(stored.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_claim_protocol() {
        let store = InMemorySessionStore::new();
        let session = new_session();
        let id = session.id;
        store.insert(session).await.unwrap();

        let alice = "alice".to_string();
        let bob = "bob".to_string();

        assert_eq!(
            store.claim_finalization(&id, &alice).await.unwrap(),
            FinalizationClaim::NotCompleted
        );

        store.complete_if_active(&id, Utc::now()).await.unwrap();
        assert_eq!(
            store.claim_finalization(&id, &alice).await.unwrap(),
            FinalizationClaim::Claimed
        );
        assert_eq!(
            store.claim_finalization(&id, &alice).await.unwrap(),
            FinalizationClaim::InProgress
        );

        store.release_finalization(&id, &alice).await.unwrap();
        assert_eq!(
            store.claim_finalization(&id, &alice).await.unwrap(),
            FinalizationClaim::Claimed
        );
        assert!(!store.commit_finalization(&id, &alice).await.unwrap());
        assert_eq!(
            store.claim_finalization(&id, &alice).await.unwrap(),
            FinalizationClaim::AlreadyApplied
        );

        assert_eq!(store.pending_finalization(10).await.unwrap(), vec![id]);

        assert_eq!(
            store.claim_finalization(&id, &bob).await.unwrap(),
            FinalizationClaim::Claimed
        );
        assert!(store.commit_finalization(&id, &bob).await.unwrap());

        let stored = store.get(&id).await.unwrap().unwrap();
        assert!(stored.stats_finalized);
        assert!(store.pending_finalization(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claim_rejects_outsiders() {
        let store = InMemorySessionStore::new();
        let session = new_session();
        let id = session.id;
        store.insert(session).await.unwrap();

        let err = store
            .claim_finalization(&id, &"mallory".to_string())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TriviaError>(),
            Some(TriviaError::NotAParticipant { .. })
        ));
    }

    #[tokio::test]
    async fn test_stats() {
        let store = InMemorySessionStore::new();
        let first = new_session();
        let first_id = first.id;
        store.insert(first).await.unwrap();
        store.insert(new_session()).await.unwrap();
        store.complete_if_active(&first_id, Utc::now()).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.completed_sessions, 1);
        assert_eq!(stats.finalized_sessions, 0);
    }
}
