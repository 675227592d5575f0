//! Answer ledger
//!
//! One answer per `(session, player, question)`; later submissions for the
//! same triple replace earlier ones, so counts never double.

use crate::error::{Result, TriviaError};
use crate::types::{Answer, AnswerCounts, PlayerId, QuestionId, SessionId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for answer persistence
#[async_trait]
pub trait AnswerLedger: Send + Sync {
    /// Insert or replace the answer for its triple. Returns true on first insert.
    async fn upsert(&self, answer: Answer) -> Result<bool>;

    /// Per-player aggregates for a session. Players with no answers are absent.
    async fn counts_for(&self, session_id: &SessionId) -> Result<HashMap<PlayerId, AnswerCounts>>;

    /// A player's answers in a session, ordered by answer time
    async fn answers_for(&self, session_id: &SessionId, player_id: &PlayerId)
        -> Result<Vec<Answer>>;

    /// Total stored answers
    async fn answer_count(&self) -> Result<usize>;
}

type SessionAnswers = HashMap<(PlayerId, QuestionId), Answer>;

/// In-memory answer ledger
#[derive(Debug, Default)]
pub struct InMemoryAnswerLedger {
    answers: RwLock<HashMap<SessionId, SessionAnswers>>,
}

impl InMemoryAnswerLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnswerLedger for InMemoryAnswerLedger {
    async fn upsert(&self, answer: Answer) -> Result<bool> {
        let mut answers = self
            .answers
            .write()
            .map_err(|_| TriviaError::InternalError {
                message: "Failed to acquire answers write lock".to_string(),
            })?;

        let key = (answer.player_id.clone(), answer.question_id);
        let previous = answers
            .entry(answer.session_id)
            .or_default()
            .insert(key, answer);
        Ok(previous.is_none())
    }

    async fn counts_for(&self, session_id: &SessionId) -> Result<HashMap<PlayerId, AnswerCounts>> {
        let answers = self
            .answers
            .read()
            .map_err(|_| TriviaError::InternalError {
                message: "Failed to acquire answers read lock".to_string(),
            })?;

        let mut totals: HashMap<PlayerId, (u32, u32, u64)> = HashMap::new();
        if let Some(session_answers) = answers.get(session_id) {
            for answer in session_answers.values() {
                let entry = totals.entry(answer.player_id.clone()).or_default();
                entry.0 += 1;
                if answer.correct {
                    entry.1 += 1;
                }
                entry.2 += answer.response_ms;
            }
        }

        Ok(totals
            .into_iter()
            .map(|(player_id, (total, correct, response_sum))| {
                let avg_response_ms = if total > 0 {
                    response_sum as f64 / f64::from(total)
                } else {
                    0.0
                };
                (
                    player_id,
                    AnswerCounts {
                        total,
                        correct,
                        avg_response_ms,
                    },
                )
            })
            .collect())
    }

    async fn answers_for(
        &self,
        session_id: &SessionId,
        player_id: &PlayerId,
    ) -> Result<Vec<Answer>> {
        let answers = self
            .answers
            .read()
            .map_err(|_| TriviaError::InternalError {
                message: "Failed to acquire answers read lock".to_string(),
            })?;

        let mut result: Vec<Answer> = answers
            .get(session_id)
            .map(|session_answers| {
                session_answers
                    .values()
                    .filter(|a| &a.player_id == player_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        result.sort_by_key(|a| a.answered_at);
        Ok(result)
    }

    async fn answer_count(&self) -> Result<usize> {
        let answers = self
            .answers
            .read()
            .map_err(|_| TriviaError::InternalError {
                message: "Failed to acquire answers read lock".to_string(),
            })?;

        Ok(answers.values().map(HashMap::len).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::current_timestamp;
    use uuid::Uuid;

    fn answer(
        session_id: SessionId,
        player: &str,
        question_id: QuestionId,
        correct: bool,
        response_ms: u64,
    ) -> Answer {
        Answer {
            session_id,
            player_id: player.to_string(),
            question_id,
            selected_index: Some(0),
            selected_answer: "A".to_string(),
            correct,
            response_ms,
            answered_at: current_timestamp(),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_per_triple() {
        let ledger = InMemoryAnswerLedger::new();
        let session = Uuid::new_v4();
        let question = Uuid::new_v4();

        assert!(ledger
            .upsert(answer(session, "alice", question, false, 900))
            .await
            .unwrap());
        assert!(!ledger
            .upsert(answer(session, "alice", question, true, 1100))
            .await
            .unwrap());

        let counts = ledger.counts_for(&session).await.unwrap();
        let alice = counts.get("alice").unwrap();
        assert_eq!(alice.total, 1);
        assert_eq!(alice.correct, 1);
        assert_eq!(alice.avg_response_ms, 1100.0);
        assert_eq!(ledger.answer_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_counts_are_per_player_and_session() {
        let ledger = InMemoryAnswerLedger::new();
        let session = Uuid::new_v4();
        let other_session = Uuid::new_v4();

        for i in 0..4 {
            ledger
                .upsert(answer(session, "alice", Uuid::new_v4(), i % 2 == 0, 1000))
                .await
                .unwrap();
        }
        ledger
            .upsert(answer(session, "bob", Uuid::new_v4(), true, 3000))
            .await
            .unwrap();
        ledger
            .upsert(answer(other_session, "alice", Uuid::new_v4(), true, 10))
            .await
            .unwrap();

        let counts = ledger.counts_for(&session).await.unwrap();
        assert_eq!(counts["alice"].total, 4);
        assert_eq!(counts["alice"].correct, 2);
        assert_eq!(counts["bob"].total, 1);
        assert_eq!(counts["bob"].avg_response_ms, 3000.0);

        let answers = ledger
            .answers_for(&session, &"alice".to_string())
            .await
            .unwrap();
        assert_eq!(answers.len(), 4);
        assert!(ledger
            .counts_for(&Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }
}
