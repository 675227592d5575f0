//! Join, leave and status orchestration around the match queue
//!
//! The matchmaker refreshes a player's level before every queue decision,
//! pairs FIFO within a level, creates the session and tells the waiting
//! player about it: by push when they have a live connection, otherwise
//! through a match notice that their next status poll consumes. Notices
//! nobody collects expire after a configurable lifetime.

use crate::error::{Result, TriviaError};
use crate::metrics::MetricsCollector;
use crate::progression::refresh_level;
use crate::queue::events::{EventPublisher, MatchFound};
use crate::queue::registry::{MatchQueue, PairingGuard, QueueDecision, QueueEntry};
use crate::session::{MatchPlayers, Session, SessionFactory};
use crate::storage::{update_player, PlayerStore};
use crate::types::{ConnectionId, Player, PlayerId, PlayerSummary, PublicQuestion, Question};
use crate::utils::current_timestamp;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const DEFAULT_VERSION_RETRIES: u32 = 5;
const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(300);

/// Result of a join request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum JoinOutcome {
    Queued { level: u32, position: usize },
    AlreadyQueued { level: u32, position: usize },
    /// The player's match is being created; it arrives by push or status poll
    Matching { level: u32 },
    Matched(MatchFound),
}

/// A player's view of their place in matchmaking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub level: u32,
    pub queued: bool,
    pub position: Option<usize>,
    /// Paired, with the session still being created
    pub matching: bool,
    /// A match made while the player was waiting, delivered once
    pub matched: Option<MatchFound>,
}

/// A match kept for a waiter who had no live push connection
#[derive(Debug, Clone)]
struct MatchNotice {
    found: MatchFound,
    stored_at: Instant,
}

impl MatchNotice {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() >= ttl
    }
}

/// Why a player left the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    Cancelled,
    Disconnected,
}

impl LeaveReason {
    fn as_str(self) -> &'static str {
        match self {
            LeaveReason::Cancelled => "cancelled",
            LeaveReason::Disconnected => "disconnected",
        }
    }
}

/// Statistics about matchmaker operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchmakerStats {
    /// Total join requests handled
    pub joins: u64,
    /// Total sessions created by pairing
    pub pairings: u64,
    /// Pairings abandoned for lack of questions
    pub question_shortages: u64,
    /// Total players removed from the queue
    pub leaves: u64,
    /// Waiting players notified by push
    pub push_notifications: u64,
    /// Current number of players waiting
    pub players_waiting: usize,
    /// Match notices dropped before anyone collected them
    pub expired_notices: u64,
    /// Match notices not yet collected by a status poll
    pub pending_notices: usize,
}

/// The matchmaker
#[derive(Clone)]
pub struct Matchmaker {
    /// Waiting players by level
    queue: Arc<MatchQueue>,
    /// Creates sessions for pairings
    session_factory: SessionFactory,
    /// Player records, for level refresh and summaries
    player_store: Arc<dyn PlayerStore>,
    /// Push delivery to connected waiters
    event_publisher: Arc<dyn EventPublisher>,
    /// Undelivered matches for waiting players
    notices: Arc<Mutex<HashMap<PlayerId, MatchNotice>>>,
    notice_ttl: Duration,
    /// Matchmaker statistics
    stats: Arc<RwLock<MatchmakerStats>>,
    /// Metrics collector for recording performance data
    metrics_collector: Arc<MetricsCollector>,
    max_version_retries: u32,
}

impl Matchmaker {
    /// Create a new matchmaker
    pub fn new(
        session_factory: SessionFactory,
        player_store: Arc<dyn PlayerStore>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let metrics_collector = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(
            session_factory,
            player_store,
            event_publisher,
            metrics_collector,
        )
    }

    /// Create a new matchmaker with metrics collector
    pub fn with_metrics(
        session_factory: SessionFactory,
        player_store: Arc<dyn PlayerStore>,
        event_publisher: Arc<dyn EventPublisher>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            queue: Arc::new(MatchQueue::new()),
            session_factory,
            player_store,
            event_publisher,
            notices: Arc::new(Mutex::new(HashMap::new())),
            notice_ttl: DEFAULT_NOTICE_TTL,
            stats: Arc::new(RwLock::new(MatchmakerStats::default())),
            metrics_collector,
            max_version_retries: DEFAULT_VERSION_RETRIES,
        }
    }

    /// Override the optimistic retry budget
    pub fn with_version_retries(mut self, max_version_retries: u32) -> Self {
        self.max_version_retries = max_version_retries;
        self
    }

    /// Override how long uncollected match notices are kept
    pub fn with_notice_ttl(mut self, notice_ttl: Duration) -> Self {
        self.notice_ttl = notice_ttl;
        self
    }

    /// Queue a player at their current level, or pair them with the longest
    /// waiting player there.
    ///
    /// A player holding an uncollected match notice gets that match back
    /// instead of queueing again.
    pub async fn join(
        &self,
        player_id: &PlayerId,
        connection: Option<ConnectionId>,
    ) -> Result<JoinOutcome> {
        let timer = self.metrics_collector.start_timer();
        self.update_stats(|stats| stats.joins += 1)?;

        let player = match self.refresh_player(player_id).await {
            Ok(player) => player,
            Err(e) => {
                self.metrics_collector.record_join("error", timer.stop());
                return Err(e);
            }
        };

        if let Some(notice) = self.take_notice(player_id)? {
            debug!(
                "Player '{}' rejoined with an uncollected match for session {}",
                player_id, notice.session_id
            );
            self.metrics_collector.record_join("matched", timer.stop());
            return Ok(JoinOutcome::Matched(notice));
        }

        let level = player.level;
        let decision = self
            .queue
            .join_or_pair(level, QueueEntry::new(player_id.clone(), connection))?;

        let outcome = match decision {
            QueueDecision::Queued { position } => {
                info!(
                    "Player '{}' queued - level: {}, position: {}",
                    player_id, level, position
                );
                self.metrics_collector.record_join("queued", timer.stop());
                JoinOutcome::Queued { level, position }
            }
            QueueDecision::AlreadyQueued { position } => {
                debug!(
                    "Player '{}' already queued - level: {}, position: {}",
                    player_id, level, position
                );
                self.metrics_collector
                    .record_join("already_queued", timer.stop());
                JoinOutcome::AlreadyQueued { level, position }
            }
            QueueDecision::Pairing => {
                debug!(
                    "Player '{}' joined while their pairing is in flight - level: {}",
                    player_id, level
                );
                self.metrics_collector.record_join("matching", timer.stop());
                JoinOutcome::Matching { level }
            }
            QueueDecision::Paired { opponent } => match self.pair(&player, opponent, level).await {
                Ok(found) => {
                    self.metrics_collector.record_join("matched", timer.stop());
                    JoinOutcome::Matched(found)
                }
                Err(e) => {
                    self.metrics_collector.record_join("error", timer.stop());
                    return Err(e);
                }
            },
        };

        self.refresh_waiting_gauge();
        Ok(outcome)
    }

    /// Remove a player from the queue. No-op if they are not waiting.
    pub fn leave(&self, player_id: &PlayerId, reason: LeaveReason) -> Result<bool> {
        let removed = self.queue.leave(player_id)?;
        Ok(self.record_leave(player_id, removed.is_some(), reason))
    }

    /// Remove a player only if they are waiting on this push connection
    pub fn disconnect(&self, player_id: &PlayerId, connection: ConnectionId) -> Result<bool> {
        let removed = self.queue.leave_connection(player_id, connection)?;
        Ok(self.record_leave(player_id, removed.is_some(), LeaveReason::Disconnected))
    }

    /// Current level, queue position and any match made while waiting
    pub async fn queue_status(&self, player_id: &PlayerId) -> Result<QueueStatus> {
        let player = self.refresh_player(player_id).await?;
        let matched = self.take_notice(player_id)?;
        let position = self.queue.position(player_id)?;
        let matching = matched.is_none() && self.queue.is_pairing(player_id)?;

        Ok(QueueStatus {
            level: player.level,
            queued: position.is_some(),
            position: position.map(|(_, at)| at),
            matching,
            matched,
        })
    }

    /// Get matchmaker statistics
    pub fn get_stats(&self) -> Result<MatchmakerStats> {
        let mut stats = self
            .stats
            .read()
            .map_err(|_| TriviaError::InternalError {
                message: "Failed to acquire stats read lock".to_string(),
            })?
            .clone();

        stats.players_waiting = self.queue.len();
        stats.pending_notices = self.notices.lock().map(|n| n.len()).unwrap_or(0);
        Ok(stats)
    }

    /// Drop match notices older than the notice lifetime. Returns how many.
    pub fn prune_notices(&self) -> Result<usize> {
        let expired = {
            let mut notices = self.lock_notices()?;
            let before = notices.len();
            notices.retain(|_, notice| !notice.is_expired(self.notice_ttl));
            before - notices.len()
        };

        if expired > 0 {
            info!("Dropped {} expired match notices", expired);
            self.update_stats(|stats| stats.expired_notices += expired as u64)?;
        }
        Ok(expired)
    }

    /// The underlying queue
    pub fn queue(&self) -> Arc<MatchQueue> {
        self.queue.clone()
    }

    async fn pair(&self, joiner: &Player, opponent: QueueEntry, level: u32) -> Result<MatchFound> {
        let mut pairing = PairingGuard::new(self.queue.clone(), level, opponent, joiner.id.clone());
        let opponent = pairing.waiter().clone();

        let (session, questions) = match self
            .session_factory
            .create(&opponent.player_id, &joiner.id, level)
            .await
        {
            Ok(created) => created,
            Err(e) => {
                if matches!(
                    e.downcast_ref::<TriviaError>(),
                    Some(TriviaError::QuestionShortage { .. })
                ) {
                    self.metrics_collector.record_question_shortage(level);
                    self.update_stats(|stats| stats.question_shortages += 1)?;
                }
                if pairing.end()? {
                    info!(
                        "Pairing at level {} abandoned, player '{}' restored to queue head",
                        level, opponent.player_id
                    );
                }
                return Err(e);
            }
        };
        pairing.seated();

        let waited = (current_timestamp() - opponent.joined_at)
            .to_std()
            .unwrap_or_default();
        self.metrics_collector.record_pairing(level, waited);
        self.metrics_collector.record_session_created();
        self.update_stats(|stats| stats.pairings += 1)?;

        let joiner_summary = joiner.summary();
        let waiter_summary = self.summary_of(&opponent.player_id).await?;
        let public_questions: Vec<PublicQuestion> =
            questions.iter().map(Question::public_view).collect();

        info!(
            "Players paired - session: {}, level: {}, '{}' waited {:.1}s for '{}'",
            session.id,
            level,
            opponent.player_id,
            waited.as_secs_f64(),
            joiner.id
        );

        let waiter_event = match_found(
            &session,
            public_questions.clone(),
            waiter_summary.clone(),
            joiner_summary.clone(),
        );
        self.notify_waiter(&opponent, waiter_event).await?;
        pairing.end()?;

        Ok(match_found(
            &session,
            public_questions,
            joiner_summary,
            waiter_summary,
        ))
    }

    async fn notify_waiter(&self, waiter: &QueueEntry, event: MatchFound) -> Result<()> {
        if let Some(connection) = waiter.connection {
            match self
                .event_publisher
                .publish_match_found(connection, event.clone())
                .await
            {
                Ok(true) => {
                    self.update_stats(|stats| stats.push_notifications += 1)?;
                    return Ok(());
                }
                Ok(false) => {
                    debug!(
                        "Connection {} for player '{}' is gone, leaving match notice",
                        connection, waiter.player_id
                    );
                }
                Err(e) => {
                    warn!(
                        "Failed to push match to player '{}': {}, leaving match notice",
                        waiter.player_id, e
                    );
                }
            }
        }

        let notice = MatchNotice {
            found: event,
            stored_at: Instant::now(),
        };
        let mut notices = self.lock_notices()?;
        match notices.entry(waiter.player_id.clone()) {
            Entry::Occupied(mut existing) if existing.get().is_expired(self.notice_ttl) => {
                existing.insert(notice);
            }
            Entry::Occupied(existing) => {
                warn!(
                    "Player '{}' still holds a match notice for session {}, not replacing it with session {}",
                    waiter.player_id,
                    existing.get().found.session_id,
                    notice.found.session_id
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(notice);
            }
        }
        Ok(())
    }

    /// Remove and return a player's notice unless it has expired
    fn take_notice(&self, player_id: &PlayerId) -> Result<Option<MatchFound>> {
        let Some(notice) = self.lock_notices()?.remove(player_id) else {
            return Ok(None);
        };

        if notice.is_expired(self.notice_ttl) {
            debug!(
                "Match notice for player '{}' and session {} expired",
                player_id, notice.found.session_id
            );
            self.update_stats(|stats| stats.expired_notices += 1)?;
            return Ok(None);
        }
        Ok(Some(notice.found))
    }

    fn lock_notices(&self) -> Result<MutexGuard<'_, HashMap<PlayerId, MatchNotice>>> {
        self.notices.lock().map_err(|_| {
            TriviaError::InternalError {
                message: "Failed to acquire match notices lock".to_string(),
            }
            .into()
        })
    }

    /// Load the player and persist a recomputed level if it went stale
    async fn refresh_player(&self, player_id: &PlayerId) -> Result<Player> {
        let (player, changed) = update_player(
            self.player_store.as_ref(),
            player_id,
            self.max_version_retries,
            |player| refresh_level(player).then_some(()),
        )
        .await?;

        if changed.is_some() {
            info!(
                "Player '{}' level refreshed to {} (xp: {})",
                player_id, player.level, player.experience
            );
        }
        Ok(player)
    }

    async fn summary_of(&self, player_id: &PlayerId) -> Result<PlayerSummary> {
        Ok(match self.player_store.find_by_id(player_id).await? {
            Some(player) => player.summary(),
            None => {
                warn!("Paired player '{}' has no record", player_id);
                PlayerSummary {
                    id: player_id.clone(),
                    username: player_id.clone(),
                    level: 1,
                    experience: 0,
                }
            }
        })
    }

    fn record_leave(&self, player_id: &PlayerId, removed: bool, reason: LeaveReason) -> bool {
        if removed {
            info!(
                "Player '{}' left the queue ({})",
                player_id,
                reason.as_str()
            );
            self.metrics_collector.record_leave(reason.as_str());
            if let Ok(mut stats) = self.stats.write() {
                stats.leaves += 1;
            }
            self.refresh_waiting_gauge();
        }
        removed
    }

    fn refresh_waiting_gauge(&self) {
        self.metrics_collector
            .queue()
            .players_waiting
            .set(self.queue.len() as i64);
    }

    fn update_stats<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut MatchmakerStats),
    {
        let mut stats = self.stats.write().map_err(|_| TriviaError::InternalError {
            message: "Failed to acquire stats write lock".to_string(),
        })?;
        update(&mut stats);
        Ok(())
    }
}

fn match_found(
    session: &Session,
    questions: Vec<PublicQuestion>,
    you: PlayerSummary,
    opponent: PlayerSummary,
) -> MatchFound {
    MatchFound {
        session_id: session.id,
        level: session.level,
        questions,
        players: MatchPlayers { you, opponent },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::events::MockEventPublisher;
    use crate::session::{InMemorySessionStore, SessionStore};
    use crate::storage::{InMemoryPlayerStore, InMemoryQuestionBank, QuestionBank};
    use crate::types::{Question, QuestionId};
    use async_trait::async_trait;
    use uuid::Uuid;

    struct Harness {
        matchmaker: Matchmaker,
        players: Arc<InMemoryPlayerStore>,
        sessions: Arc<InMemorySessionStore>,
        publisher: Arc<MockEventPublisher>,
    }

    fn bank(levels: &[(u32, usize)]) -> Arc<InMemoryQuestionBank> {
        let bank = InMemoryQuestionBank::new();
        for &(level, count) in levels {
            for n in 0..count {
                bank.insert(Question {
                    id: Uuid::new_v4(),
                    level,
                    text: format!("L{} Q{}", level, n),
                    options: vec!["a".to_string(), "b".to_string()],
                    correct_answer: "a".to_string(),
                })
                .unwrap();
            }
        }
        Arc::new(bank)
    }

    /// Bank whose sampling takes `delay`, holding pairings in flight
    struct SlowQuestionBank {
        inner: Arc<InMemoryQuestionBank>,
        delay: Duration,
    }

    #[async_trait]
    impl QuestionBank for SlowQuestionBank {
        async fn sample_by_level(&self, level: u32, count: usize) -> Result<Vec<Question>> {
            tokio::time::sleep(self.delay).await;
            self.inner.sample_by_level(level, count).await
        }

        async fn get_many(&self, ids: &[QuestionId]) -> Result<Vec<Question>> {
            self.inner.get_many(ids).await
        }

        async fn count_by_level(&self, level: u32) -> Result<usize> {
            self.inner.count_by_level(level).await
        }
    }

    async fn create_test_harness(
        levels: &[(u32, usize)],
        publisher: MockEventPublisher,
    ) -> Harness {
        create_harness_with_bank(bank(levels), publisher).await
    }

    async fn create_harness_with_bank(
        bank: Arc<dyn QuestionBank>,
        publisher: MockEventPublisher,
    ) -> Harness {
        let players = Arc::new(InMemoryPlayerStore::new());
        let sessions = Arc::new(InMemorySessionStore::new());
        let publisher = Arc::new(publisher);
        let factory = SessionFactory::new(bank, sessions.clone());
        let matchmaker = Matchmaker::new(factory, players.clone(), publisher.clone());

        Harness {
            matchmaker,
            players,
            sessions,
            publisher,
        }
    }

    async fn add_player(h: &Harness, id: &str, experience: u64) {
        let mut player = Player::new(id, id.to_uppercase());
        player.experience = experience;
        h.players.insert(player).await.unwrap();
    }

    #[tokio::test]
    async fn test_join_then_pair() {
        let h = create_test_harness(&[(1, 12)], MockEventPublisher::new()).await;
        add_player(&h, "alice", 0).await;
        add_player(&h, "bob", 50).await;

        let first = h.matchmaker.join(&"alice".to_string(), None).await.unwrap();
        assert!(matches!(
            first,
            JoinOutcome::Queued {
                level: 1,
                position: 0
            }
        ));

        let second = h.matchmaker.join(&"bob".to_string(), None).await.unwrap();
        let JoinOutcome::Matched(found) = second else {
            panic!("expected a match");
        };
        assert_eq!(found.questions.len(), 10);
        assert_eq!(found.players.you.id, "bob");
        assert_eq!(found.players.opponent.id, "alice");

        let session = h.sessions.get(&found.session_id).await.unwrap().unwrap();
        assert_eq!(session.players[0], "alice");
        assert_eq!(session.players[1], "bob");
        assert_eq!(h.matchmaker.get_stats().unwrap().pairings, 1);
    }

    #[tokio::test]
    async fn test_polling_waiter_collects_notice_once() {
        let h = create_test_harness(&[(1, 10)], MockEventPublisher::new()).await;
        add_player(&h, "alice", 0).await;
        add_player(&h, "bob", 0).await;
        let alice = "alice".to_string();

        h.matchmaker.join(&alice, None).await.unwrap();
        let JoinOutcome::Matched(bob_view) =
            h.matchmaker.join(&"bob".to_string(), None).await.unwrap()
        else {
            panic!("expected a match");
        };

        let status = h.matchmaker.queue_status(&alice).await.unwrap();
        assert!(!status.queued);
        let notice = status.matched.expect("match notice");
        assert_eq!(notice.session_id, bob_view.session_id);
        assert_eq!(notice.players.you.id, "alice");

        let again = h.matchmaker.queue_status(&alice).await.unwrap();
        assert!(again.matched.is_none());
    }

    #[tokio::test]
    async fn test_connected_waiter_is_pushed() {
        let h = create_test_harness(&[(1, 10)], MockEventPublisher::new()).await;
        add_player(&h, "alice", 0).await;
        add_player(&h, "bob", 0).await;
        let connection = Uuid::new_v4();

        h.matchmaker
            .join(&"alice".to_string(), Some(connection))
            .await
            .unwrap();
        h.matchmaker.join(&"bob".to_string(), None).await.unwrap();

        let events = h.publisher.get_published_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, connection);
        assert_eq!(events[0].1.players.you.id, "alice");
        assert!(h
            .matchmaker
            .queue_status(&"alice".to_string())
            .await
            .unwrap()
            .matched
            .is_none());
    }

    #[tokio::test]
    async fn test_failed_push_falls_back_to_notice() {
        let h = create_test_harness(&[(1, 10)], MockEventPublisher::disconnected()).await;
        add_player(&h, "alice", 0).await;
        add_player(&h, "bob", 0).await;

        h.matchmaker
            .join(&"alice".to_string(), Some(Uuid::new_v4()))
            .await
            .unwrap();
        h.matchmaker.join(&"bob".to_string(), None).await.unwrap();

        let rejoin = h.matchmaker.join(&"alice".to_string(), None).await.unwrap();
        assert!(matches!(rejoin, JoinOutcome::Matched(_)));
    }

    #[tokio::test]
    async fn test_no_cross_level_pairing() {
        let h = create_test_harness(&[(1, 10), (2, 10)], MockEventPublisher::new()).await;
        add_player(&h, "alice", 0).await;
        add_player(&h, "bob", 250).await;

        h.matchmaker.join(&"alice".to_string(), None).await.unwrap();
        let bob = h.matchmaker.join(&"bob".to_string(), None).await.unwrap();
        assert!(matches!(
            bob,
            JoinOutcome::Queued {
                level: 2,
                position: 0
            }
        ));
        assert_eq!(h.matchmaker.get_stats().unwrap().players_waiting, 2);
    }

    #[tokio::test]
    async fn test_level_is_refreshed_before_queueing() {
        let h = create_test_harness(&[(3, 10)], MockEventPublisher::new()).await;
        add_player(&h, "alice", 599).await;

        let status = h
            .matchmaker
            .queue_status(&"alice".to_string())
            .await
            .unwrap();
        assert_eq!(status.level, 3);

        let stored = h
            .players
            .find_by_id(&"alice".to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.level, 3);
    }

    #[tokio::test]
    async fn test_shortage_restores_waiter() {
        let h = create_test_harness(&[(1, 9)], MockEventPublisher::new()).await;
        add_player(&h, "alice", 0).await;
        add_player(&h, "bob", 0).await;

        h.matchmaker.join(&"alice".to_string(), None).await.unwrap();
        let err = h
            .matchmaker
            .join(&"bob".to_string(), None)
            .await
            .unwrap_err();
        let trivia = err.downcast_ref::<TriviaError>().unwrap();
        assert!(matches!(trivia, TriviaError::QuestionShortage { .. }));
        assert!(trivia.is_retryable());

        assert_eq!(h.sessions.stats().await.unwrap().total_sessions, 0);
        let status = h
            .matchmaker
            .queue_status(&"alice".to_string())
            .await
            .unwrap();
        assert_eq!(status.position, Some(0));
        assert!(!h
            .matchmaker
            .queue_status(&"bob".to_string())
            .await
            .unwrap()
            .queued);
        assert_eq!(h.matchmaker.get_stats().unwrap().question_shortages, 1);
    }

    #[tokio::test]
    async fn test_unknown_player() {
        let h = create_test_harness(&[(1, 10)], MockEventPublisher::new()).await;
        let err = h
            .matchmaker
            .join(&"ghost".to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TriviaError>(),
            Some(TriviaError::PlayerNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_leave_and_disconnect() {
        let h = create_test_harness(&[(1, 10)], MockEventPublisher::new()).await;
        add_player(&h, "alice", 0).await;
        let alice = "alice".to_string();
        let connection = Uuid::new_v4();

        h.matchmaker.join(&alice, Some(connection)).await.unwrap();
        assert!(!h.matchmaker.disconnect(&alice, Uuid::new_v4()).unwrap());
        assert!(h.matchmaker.disconnect(&alice, connection).unwrap());
        assert!(!h.matchmaker.leave(&alice, LeaveReason::Cancelled).unwrap());

        h.matchmaker.join(&alice, None).await.unwrap();
        assert!(h.matchmaker.leave(&alice, LeaveReason::Cancelled).unwrap());
        assert_eq!(h.matchmaker.get_stats().unwrap().leaves, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_repeat_join_during_pairing_seats_once() {
        let slow = SlowQuestionBank {
            inner: bank(&[(1, 30)]),
            delay: Duration::from_millis(200),
        };
        let h = create_harness_with_bank(Arc::new(slow), MockEventPublisher::new()).await;
        for id in ["alice", "bob", "carol"] {
            add_player(&h, id, 0).await;
        }
        let alice = "alice".to_string();

        h.matchmaker.join(&alice, None).await.unwrap();
        let bob_join = {
            let matchmaker = h.matchmaker.clone();
            tokio::spawn(async move { matchmaker.join(&"bob".to_string(), None).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Both halves of the in-flight pairing are turned away
        let rejoin = h.matchmaker.join(&alice, None).await.unwrap();
        assert!(matches!(rejoin, JoinOutcome::Matching { level: 1 }));
        let bob_again = h.matchmaker.join(&"bob".to_string(), None).await.unwrap();
        assert!(matches!(bob_again, JoinOutcome::Matching { level: 1 }));
        assert!(h.matchmaker.queue_status(&alice).await.unwrap().matching);

        let carol = h.matchmaker.join(&"carol".to_string(), None).await.unwrap();
        assert!(matches!(carol, JoinOutcome::Queued { position: 0, .. }));

        let JoinOutcome::Matched(bob_view) = bob_join.await.unwrap().unwrap() else {
            panic!("expected a match");
        };
        assert_eq!(h.sessions.stats().await.unwrap().total_sessions, 1);

        let status = h.matchmaker.queue_status(&alice).await.unwrap();
        assert!(!status.queued);
        assert!(!status.matching);
        assert_eq!(status.matched.unwrap().session_id, bob_view.session_id);
        assert_eq!(h.matchmaker.queue().pairing_len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_pairing_restores_waiter() {
        let slow = SlowQuestionBank {
            inner: bank(&[(1, 10)]),
            delay: Duration::from_secs(5),
        };
        let h = create_harness_with_bank(Arc::new(slow), MockEventPublisher::new()).await;
        add_player(&h, "alice", 0).await;
        add_player(&h, "bob", 0).await;

        h.matchmaker.join(&"alice".to_string(), None).await.unwrap();
        let bob_join = {
            let matchmaker = h.matchmaker.clone();
            tokio::spawn(async move { matchmaker.join(&"bob".to_string(), None).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        bob_join.abort();
        assert!(bob_join.await.unwrap_err().is_cancelled());

        let status = h
            .matchmaker
            .queue_status(&"alice".to_string())
            .await
            .unwrap();
        assert_eq!(status.position, Some(0));
        assert!(!status.matching);
        assert!(!h.matchmaker.queue().is_pairing(&"bob".to_string()).unwrap());
    }

    #[tokio::test]
    async fn test_expired_notices_are_dropped() {
        let h = create_test_harness(&[(1, 40)], MockEventPublisher::new()).await;
        let matchmaker = h
            .matchmaker
            .clone()
            .with_notice_ttl(Duration::from_millis(30));
        for id in ["alice", "bob", "carol", "dave"] {
            add_player(&h, id, 0).await;
        }

        matchmaker.join(&"alice".to_string(), None).await.unwrap();
        matchmaker.join(&"bob".to_string(), None).await.unwrap();
        matchmaker.join(&"carol".to_string(), None).await.unwrap();
        matchmaker.join(&"dave".to_string(), None).await.unwrap();
        assert_eq!(matchmaker.get_stats().unwrap().pending_notices, 2);

        tokio::time::sleep(Duration::from_millis(60)).await;

        // One lapses on collection, the other in the periodic prune
        let status = matchmaker.queue_status(&"alice".to_string()).await.unwrap();
        assert!(status.matched.is_none());
        assert_eq!(matchmaker.prune_notices().unwrap(), 1);
        assert_eq!(matchmaker.prune_notices().unwrap(), 0);

        let stats = matchmaker.get_stats().unwrap();
        assert_eq!(stats.pending_notices, 0);
        assert_eq!(stats.expired_notices, 2);

        // An expired notice no longer short-circuits a join
        let rejoin = matchmaker.join(&"carol".to_string(), None).await.unwrap();
        assert!(matches!(rejoin, JoinOutcome::Queued { .. }));
    }
}
