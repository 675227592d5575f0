//! Answer recording, session completion and stat finalization
//!
//! The `ResultAggregator` owns every transition of a session after creation:
//!
//! - Submissions are validated, upserted into the ledger and checked for
//!   completion while holding the session's lock, so two racing submissions
//!   transition the session exactly once.
//! - Outcomes are derived from correct counts only.
//! - Stats are applied through a single idempotent `finalize_player`, reached
//!   from the background task spawned by `get_result`, the explicit
//!   `finalize_stats` call, and the periodic sweep.

use crate::error::{Result, TriviaError};
use crate::metrics::MetricsCollector;
use crate::progression::apply_session_result;
use crate::session::ledger::AnswerLedger;
use crate::session::locks::SessionLocks;
use crate::session::store::{FinalizationClaim, Session, SessionStore};
use crate::storage::{update_player, PlayerStore, QuestionBank};
use crate::types::{
    Answer, AnswerCounts, AnswerSubmission, Outcome, PlayerId, PlayerSummary, PublicQuestion,
    Question, QuestionId, SessionId, SessionStatus,
};
use crate::utils::current_timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Default retries on optimistic player-store conflicts
const DEFAULT_VERSION_RETRIES: u32 = 5;

/// Trigger path of a finalization, used for logs and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizationPath {
    Background,
    Explicit,
    Sweep,
}

impl FinalizationPath {
    fn as_str(self) -> &'static str {
        match self {
            FinalizationPath::Background => "background",
            FinalizationPath::Explicit => "explicit",
            FinalizationPath::Sweep => "sweep",
        }
    }
}

/// Acknowledgement of a submission batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub session_id: SessionId,
    /// True when this batch completed the session
    pub completed: bool,
    pub total_questions: usize,
    /// Distinct questions this player has answered so far
    pub your_answered: u32,
    /// Correct answers among this batch
    pub correct_answers: u32,
    pub recorded: usize,
    pub skipped: usize,
}

/// Acknowledgement of a single answer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerReceipt {
    pub session_id: SessionId,
    pub question_id: QuestionId,
    /// Correctness of the answer; absent if the question is not in the session
    pub correct: Option<bool>,
    /// True when this answer completed the session
    pub completed: bool,
    pub your_answered: u32,
}

/// One of the requester's recorded answers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerReview {
    pub question_id: QuestionId,
    pub selected_answer: String,
    pub correct: bool,
    pub response_ms: u64,
}

impl From<Answer> for AnswerReview {
    fn from(answer: Answer) -> Self {
        Self {
            question_id: answer.question_id,
            selected_answer: answer.selected_answer,
            correct: answer.correct,
            response_ms: answer.response_ms,
        }
    }
}

/// One seat of a session result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatResult {
    #[serde(flatten)]
    pub player: PlayerSummary,
    pub correct: u32,
    pub total: u32,
    pub avg_response_ms: u64,
    pub outcome: Option<Outcome>,
}

/// Result of a session from the requester's point of view
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub total_questions: usize,
    pub stats_finalized: bool,
    /// The requester's outcome; absent while the session is active
    pub outcome: Option<Outcome>,
    pub p1: SeatResult,
    pub p2: SeatResult,
    /// The requester's own answers in answer order
    pub your_answers: Vec<AnswerReview>,
}

/// Both participants as seen by one of them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPlayers {
    pub you: PlayerSummary,
    pub opponent: PlayerSummary,
}

/// A session as loaded by one of its players
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: SessionId,
    pub level: u32,
    pub status: SessionStatus,
    pub questions: Vec<PublicQuestion>,
    pub players: MatchPlayers,
    pub your_answered: u32,
}

/// What a finalization attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum FinalizationStatus {
    /// Stats applied by this call
    Applied { outcome: Outcome, xp_awarded: u64 },
    /// Stats were applied earlier
    AlreadyApplied,
    /// Another caller is applying them right now
    InProgress,
    /// The session is still active
    Pending,
}

/// Report of an explicit finalization request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizationReport {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    #[serde(flatten)]
    pub status: FinalizationStatus,
    pub stats_finalized: bool,
}

/// Statistics about aggregator operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultAggregatorStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub completed_sessions: usize,
    pub finalized_sessions: usize,
    pub pending_finalization: usize,
    pub answers_recorded: usize,
    pub open_session_locks: usize,
}

/// Coordinates answer submission, completion and finalization
#[derive(Clone)]
pub struct ResultAggregator {
    session_store: Arc<dyn SessionStore>,
    ledger: Arc<dyn AnswerLedger>,
    player_store: Arc<dyn PlayerStore>,
    question_bank: Arc<dyn QuestionBank>,
    locks: Arc<SessionLocks>,
    metrics_collector: Arc<MetricsCollector>,
    max_version_retries: u32,
}

impl ResultAggregator {
    /// Create a new aggregator
    pub fn new(
        session_store: Arc<dyn SessionStore>,
        ledger: Arc<dyn AnswerLedger>,
        player_store: Arc<dyn PlayerStore>,
        question_bank: Arc<dyn QuestionBank>,
    ) -> Self {
        let metrics_collector = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(
            session_store,
            ledger,
            player_store,
            question_bank,
            metrics_collector,
        )
    }

    /// Create a new aggregator with metrics collector
    pub fn with_metrics(
        session_store: Arc<dyn SessionStore>,
        ledger: Arc<dyn AnswerLedger>,
        player_store: Arc<dyn PlayerStore>,
        question_bank: Arc<dyn QuestionBank>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            session_store,
            ledger,
            player_store,
            question_bank,
            locks: Arc::new(SessionLocks::new()),
            metrics_collector,
            max_version_retries: DEFAULT_VERSION_RETRIES,
        }
    }

    /// Override the optimistic retry budget
    pub fn with_version_retries(mut self, max_version_retries: u32) -> Self {
        self.max_version_retries = max_version_retries;
        self
    }

    /// Record a single answer and complete the session if it was the last
    /// one missing
    pub async fn record_answer(
        &self,
        player_id: &PlayerId,
        session_id: &SessionId,
        submission: AnswerSubmission,
    ) -> Result<AnswerReceipt> {
        let timer = self.metrics_collector.start_timer();
        let lock = self.locks.lock_for(session_id)?;
        let _guard = lock.lock().await;

        let session = self.load_active_session(player_id, session_id).await?;
        let questions = self.question_map(&session).await?;
        let question_id = submission.question_id;
        let correct = self
            .record_locked(&session, player_id, &questions, submission)
            .await?;
        let (completed, counts) = self.complete_if_ready(&session).await?;

        let recorded = usize::from(correct.is_some());
        self.metrics_collector
            .record_submission(recorded, 1 - recorded, timer.stop());
        debug!(
            "Answer recorded - session: {}, player: '{}', question: {}, correct: {:?}",
            session_id, player_id, question_id, correct
        );

        Ok(AnswerReceipt {
            session_id: *session_id,
            question_id,
            correct,
            completed,
            your_answered: counts.get(player_id).map_or(0, |c| c.total),
        })
    }

    /// Record a batch of answers and complete the session if both players
    /// have now answered every question
    pub async fn submit_answers(
        &self,
        player_id: &PlayerId,
        session_id: &SessionId,
        answers: Vec<AnswerSubmission>,
    ) -> Result<SubmissionReceipt> {
        let timer = self.metrics_collector.start_timer();

        if answers.is_empty() {
            return Err(TriviaError::InvalidRequest {
                reason: "answers must be a non-empty list".to_string(),
            }
            .into());
        }

        let lock = self.locks.lock_for(session_id)?;
        let _guard = lock.lock().await;

        let session = self.load_active_session(player_id, session_id).await?;
        let questions = self.question_map(&session).await?;

        let mut recorded = 0;
        let mut skipped = 0;
        let mut correct_answers = 0;
        for submission in answers {
            match self
                .record_locked(&session, player_id, &questions, submission)
                .await?
            {
                Some(correct) => {
                    recorded += 1;
                    if correct {
                        correct_answers += 1;
                    }
                }
                None => skipped += 1,
            }
        }

        let (completed, counts) = self.complete_if_ready(&session).await?;
        let your_answered = counts.get(player_id).map_or(0, |c| c.total);

        self.metrics_collector
            .record_submission(recorded, skipped, timer.stop());

        info!(
            "Answers submitted - session: {}, player: '{}', recorded: {}, skipped: {}, answered: {}/{}, completed: {}",
            session_id, player_id, recorded, skipped, your_answered, session.questions.len(), completed
        );

        Ok(SubmissionReceipt {
            session_id: *session_id,
            completed,
            total_questions: session.questions.len(),
            your_answered,
            correct_answers,
            recorded,
            skipped,
        })
    }

    /// Questions and participants of a session, for one of its players
    pub async fn session_view(
        &self,
        player_id: &PlayerId,
        session_id: &SessionId,
    ) -> Result<SessionView> {
        let session = self.load_member_session(player_id, session_id).await?;

        let questions = self.question_bank.get_many(&session.questions).await?;
        if questions.len() != session.questions.len() {
            warn!(
                "Session {} references {} questions but only {} are in the bank",
                session_id,
                session.questions.len(),
                questions.len()
            );
        }

        let opponent_id = session
            .opponent_of(player_id)
            .cloned()
            .unwrap_or_default();
        let counts = self.ledger.counts_for(session_id).await?;

        Ok(SessionView {
            session_id: session.id,
            level: session.level,
            status: session.status,
            questions: questions.iter().map(Question::public_view).collect(),
            players: MatchPlayers {
                you: self.player_summary(player_id).await?,
                opponent: self.player_summary(&opponent_id).await?,
            },
            your_answered: counts.get(player_id).map_or(0, |c| c.total),
        })
    }

    /// Result of a session for one of its players.
    ///
    /// Fetching a completed, unfinalized result starts finalization in the
    /// background; the returned `stats_finalized` reflects the state before it.
    pub async fn get_result(
        &self,
        player_id: &PlayerId,
        session_id: &SessionId,
    ) -> Result<SessionResult> {
        let session = self.load_member_session(player_id, session_id).await?;
        let counts = self.ledger.counts_for(session_id).await?;

        let outcomes = match session.status {
            SessionStatus::Completed => Some(seat_outcomes(&session, &counts)),
            SessionStatus::Active => None,
        };

        let p1 = self.seat_result(&session, &counts, outcomes, 0).await?;
        let p2 = self.seat_result(&session, &counts, outcomes, 1).await?;

        let requester_outcome = match (outcomes, session.seat_of(player_id)) {
            (Some(o), Some(seat)) => Some(o[seat]),
            _ => None,
        };
        let your_answers = self
            .ledger
            .answers_for(session_id, player_id)
            .await?
            .into_iter()
            .map(AnswerReview::from)
            .collect();

        if session.status == SessionStatus::Completed && !session.stats_finalized {
            debug!(
                "Result fetched for unfinalized session {}, finalizing in background",
                session_id
            );
            let aggregator = self.clone();
            let session_id = *session_id;
            tokio::spawn(async move {
                if let Err(e) = aggregator
                    .finalize(&session_id, FinalizationPath::Background)
                    .await
                {
                    error!(
                        "Background finalization failed for session {}: {}",
                        session_id, e
                    );
                }
            });
        }

        Ok(SessionResult {
            session_id: session.id,
            status: session.status,
            total_questions: session.questions.len(),
            stats_finalized: session.stats_finalized,
            outcome: requester_outcome,
            p1,
            p2,
            your_answers,
        })
    }

    /// Explicitly finalize one player's stats.
    ///
    /// `claimed_outcome` is advisory: the ledger-derived outcome is always
    /// the one applied.
    pub async fn finalize_stats(
        &self,
        player_id: &PlayerId,
        session_id: &SessionId,
        claimed_outcome: Option<Outcome>,
    ) -> Result<FinalizationReport> {
        let session = self.load_member_session(player_id, session_id).await?;

        if let Some(claimed) = claimed_outcome {
            if session.status == SessionStatus::Completed {
                let counts = self.ledger.counts_for(session_id).await?;
                let actual = outcome_for(&session, &counts, player_id)?;
                if actual != claimed {
                    warn!(
                        "Client claimed '{}' for player '{}' in session {}, applying '{}'",
                        claimed, player_id, session_id, actual
                    );
                }
            }
        }

        let status = self
            .finalize_player(session_id, player_id, FinalizationPath::Explicit)
            .await?;

        let stats_finalized = self
            .session_store
            .get(session_id)
            .await?
            .map(|s| s.stats_finalized)
            .unwrap_or(false);

        Ok(FinalizationReport {
            session_id: *session_id,
            player_id: player_id.clone(),
            status,
            stats_finalized,
        })
    }

    /// Apply one player's stats for a completed session at most once
    pub async fn finalize_player(
        &self,
        session_id: &SessionId,
        player_id: &PlayerId,
        path: FinalizationPath,
    ) -> Result<FinalizationStatus> {
        let claim = self
            .session_store
            .claim_finalization(session_id, player_id)
            .await?;

        match claim {
            FinalizationClaim::NotCompleted => {
                self.metrics_collector
                    .record_finalization(path.as_str(), "pending");
                return Ok(FinalizationStatus::Pending);
            }
            FinalizationClaim::AlreadyApplied => {
                self.metrics_collector
                    .record_finalization(path.as_str(), "already_applied");
                return Ok(FinalizationStatus::AlreadyApplied);
            }
            FinalizationClaim::InProgress => {
                self.metrics_collector
                    .record_finalization(path.as_str(), "in_progress");
                return Ok(FinalizationStatus::InProgress);
            }
            FinalizationClaim::Claimed => {}
        }

        match self.apply_claimed(session_id, player_id).await {
            Ok((outcome, xp_awarded)) => {
                let fully_finalized = self
                    .session_store
                    .commit_finalization(session_id, player_id)
                    .await?;

                self.metrics_collector
                    .record_finalization(path.as_str(), "applied");
                self.metrics_collector.record_xp_awarded(outcome, xp_awarded);
                info!(
                    "Stats applied - session: {}, player: '{}', outcome: {}, xp: +{}, path: {}",
                    session_id,
                    player_id,
                    outcome,
                    xp_awarded,
                    path.as_str()
                );

                if fully_finalized {
                    self.metrics_collector.record_session_finalized();
                    info!("Session {} fully finalized", session_id);
                }

                Ok(FinalizationStatus::Applied {
                    outcome,
                    xp_awarded,
                })
            }
            Err(e) => {
                self.metrics_collector
                    .record_finalization(path.as_str(), "failed");
                warn!(
                    "Finalization failed - session: {}, player: '{}', path: {}, error: {}",
                    session_id,
                    player_id,
                    path.as_str(),
                    e
                );
                if let Err(release_err) = self
                    .session_store
                    .release_finalization(session_id, player_id)
                    .await
                {
                    error!(
                        "Failed to release finalization claim - session: {}, player: '{}': {}",
                        session_id, player_id, release_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Finalize both players of a session. Returns whether the session is
    /// now fully finalized.
    pub async fn finalize(&self, session_id: &SessionId, path: FinalizationPath) -> Result<bool> {
        let session = self.session_store.get(session_id).await?.ok_or(
            TriviaError::SessionNotFound {
                session_id: *session_id,
            },
        )?;

        if session.status != SessionStatus::Completed || session.stats_finalized {
            return Ok(session.stats_finalized);
        }

        let mut first_error = None;
        for player_id in &session.players {
            if let Err(e) = self.finalize_player(session_id, player_id, path).await {
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        Ok(self
            .session_store
            .get(session_id)
            .await?
            .map(|s| s.stats_finalized)
            .unwrap_or(false))
    }

    /// Finalize up to `limit` completed sessions that still have stats pending.
    /// Returns how many became fully finalized.
    pub async fn sweep_pending(&self, limit: usize) -> Result<usize> {
        let pending = self.session_store.pending_finalization(limit).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        debug!("Finalization sweep found {} pending sessions", pending.len());
        let mut finalized = 0;
        for session_id in pending {
            match self.finalize(&session_id, FinalizationPath::Sweep).await {
                Ok(true) => finalized += 1,
                Ok(false) => {}
                Err(e) => warn!("Sweep could not finalize session {}: {}", session_id, e),
            }
        }

        if finalized > 0 {
            info!("Finalization sweep finalized {} sessions", finalized);
        }
        Ok(finalized)
    }

    /// Get aggregator statistics
    pub async fn get_stats(&self) -> Result<ResultAggregatorStats> {
        let store_stats = self.session_store.stats().await?;
        Ok(ResultAggregatorStats {
            total_sessions: store_stats.total_sessions,
            active_sessions: store_stats.active_sessions,
            completed_sessions: store_stats.completed_sessions,
            finalized_sessions: store_stats.finalized_sessions,
            pending_finalization: store_stats.completed_sessions
                - store_stats.finalized_sessions,
            answers_recorded: self.ledger.answer_count().await?,
            open_session_locks: self.locks.len(),
        })
    }

    async fn load_member_session(
        &self,
        player_id: &PlayerId,
        session_id: &SessionId,
    ) -> Result<Session> {
        let session = self.session_store.get(session_id).await?.ok_or(
            TriviaError::SessionNotFound {
                session_id: *session_id,
            },
        )?;

        if !session.is_participant(player_id) {
            return Err(TriviaError::NotAParticipant {
                player_id: player_id.clone(),
                session_id: *session_id,
            }
            .into());
        }
        Ok(session)
    }

    async fn load_active_session(
        &self,
        player_id: &PlayerId,
        session_id: &SessionId,
    ) -> Result<Session> {
        let session = self.session_store.get(session_id).await?.ok_or(
            TriviaError::SessionNotFound {
                session_id: *session_id,
            },
        )?;

        if !session.is_active() {
            return Err(TriviaError::SessionNotActive {
                session_id: *session_id,
            }
            .into());
        }
        if !session.is_participant(player_id) {
            return Err(TriviaError::NotAParticipant {
                player_id: player_id.clone(),
                session_id: *session_id,
            }
            .into());
        }
        Ok(session)
    }

    async fn question_map(&self, session: &Session) -> Result<HashMap<QuestionId, Question>> {
        Ok(self
            .question_bank
            .get_many(&session.questions)
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect())
    }

    /// Must be called with the session lock held
    async fn record_locked(
        &self,
        session: &Session,
        player_id: &PlayerId,
        questions: &HashMap<QuestionId, Question>,
        submission: AnswerSubmission,
    ) -> Result<Option<bool>> {
        if !session.contains_question(&submission.question_id) {
            debug!(
                "Skipping answer for question {} outside session {}",
                submission.question_id, session.id
            );
            return Ok(None);
        }

        let Some(question) = questions.get(&submission.question_id) else {
            warn!(
                "Question {} of session {} is missing from the bank, skipping answer",
                submission.question_id, session.id
            );
            return Ok(None);
        };

        let correct = question.is_correct(&submission.selected_answer);
        let selected_index = submission.selected_index.or_else(|| {
            question
                .options
                .iter()
                .position(|o| *o == submission.selected_answer)
        });

        self.ledger
            .upsert(Answer {
                session_id: session.id,
                player_id: player_id.clone(),
                question_id: submission.question_id,
                selected_index,
                selected_answer: submission.selected_answer,
                correct,
                response_ms: submission.response_ms,
                answered_at: current_timestamp(),
            })
            .await?;

        Ok(Some(correct))
    }

    /// Must be called with the session lock held
    async fn complete_if_ready(
        &self,
        session: &Session,
    ) -> Result<(bool, HashMap<PlayerId, AnswerCounts>)> {
        let counts = self.ledger.counts_for(&session.id).await?;
        let required = session.questions.len() as u32;

        let everyone_done = session
            .players
            .iter()
            .all(|p| counts.get(p).is_some_and(|c| c.total >= required));
        if !everyone_done {
            return Ok((false, counts));
        }

        let finished_at = current_timestamp();
        let transitioned = self
            .session_store
            .complete_if_active(&session.id, finished_at)
            .await?;

        if transitioned {
            let duration = (finished_at - session.started_at)
                .to_std()
                .unwrap_or_default();
            self.metrics_collector.record_session_completed(duration);

            let outcomes = seat_outcomes(session, &counts);
            info!(
                "Session {} completed - '{}': {}, '{}': {}, duration: {:.1}s",
                session.id,
                session.players[0],
                outcomes[0],
                session.players[1],
                outcomes[1],
                duration.as_secs_f64()
            );
        }

        Ok((transitioned, counts))
    }

    async fn apply_claimed(
        &self,
        session_id: &SessionId,
        player_id: &PlayerId,
    ) -> Result<(Outcome, u64)> {
        let start = Instant::now();
        let session = self.session_store.get(session_id).await?.ok_or(
            TriviaError::SessionNotFound {
                session_id: *session_id,
            },
        )?;
        let counts = self.ledger.counts_for(session_id).await?;
        let outcome = outcome_for(&session, &counts, player_id)?;
        let own_counts = counts.get(player_id).copied().unwrap_or_default();

        let (_, xp) = update_player(
            self.player_store.as_ref(),
            player_id,
            self.max_version_retries,
            |player| Some(apply_session_result(player, outcome, &own_counts)),
        )
        .await?;

        self.metrics_collector
            .record_operation("apply_stats", start.elapsed());
        Ok((outcome, xp.unwrap_or_default()))
    }

    async fn seat_result(
        &self,
        session: &Session,
        counts: &HashMap<PlayerId, AnswerCounts>,
        outcomes: Option<[Outcome; 2]>,
        seat: usize,
    ) -> Result<SeatResult> {
        let player_id = &session.players[seat];
        let seat_counts = counts.get(player_id).copied().unwrap_or_default();

        Ok(SeatResult {
            player: self.player_summary(player_id).await?,
            correct: seat_counts.correct,
            total: seat_counts.total,
            avg_response_ms: seat_counts.avg_response_ms.round() as u64,
            outcome: outcomes.map(|o| o[seat]),
        })
    }

    async fn player_summary(&self, player_id: &PlayerId) -> Result<PlayerSummary> {
        Ok(match self.player_store.find_by_id(player_id).await? {
            Some(player) => player.summary(),
            None => PlayerSummary {
                id: player_id.clone(),
                username: player_id.clone(),
                level: 1,
                experience: 0,
            },
        })
    }
}

/// Outcomes for seat 0 and seat 1
fn seat_outcomes(session: &Session, counts: &HashMap<PlayerId, AnswerCounts>) -> [Outcome; 2] {
    let correct = |p: &PlayerId| counts.get(p).map_or(0, |c| c.correct);
    let first = Outcome::resolve(correct(&session.players[0]), correct(&session.players[1]));
    [first, first.mirrored()]
}

fn outcome_for(
    session: &Session,
    counts: &HashMap<PlayerId, AnswerCounts>,
    player_id: &PlayerId,
) -> Result<Outcome> {
    let seat = session
        .seat_of(player_id)
        .ok_or_else(|| TriviaError::NotAParticipant {
            player_id: player_id.clone(),
            session_id: session.id,
        })?;
    Ok(seat_outcomes(session, counts)[seat])
}
