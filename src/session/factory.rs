//! Session creation
//!
//! A session is only persisted once a full question set is in hand, so a
//! shortage never leaves an orphaned session behind.

use crate::error::{Result, TriviaError};
use crate::session::store::{Session, SessionStore};
use crate::storage::QuestionBank;
use crate::types::{PlayerId, Question, QUESTIONS_PER_SESSION};
use std::sync::Arc;
use tracing::{info, warn};

/// Creates sessions from a pairing
#[derive(Clone)]
pub struct SessionFactory {
    question_bank: Arc<dyn QuestionBank>,
    session_store: Arc<dyn SessionStore>,
    questions_per_session: usize,
}

impl SessionFactory {
    pub fn new(question_bank: Arc<dyn QuestionBank>, session_store: Arc<dyn SessionStore>) -> Self {
        Self {
            question_bank,
            session_store,
            questions_per_session: QUESTIONS_PER_SESSION,
        }
    }

    /// Sample a question set and persist a new active session.
    ///
    /// `waiting` takes seat 0. Fails with `QuestionShortage` if the level has
    /// fewer questions than a session needs; nothing is persisted then.
    pub async fn create(
        &self,
        waiting: &PlayerId,
        joining: &PlayerId,
        level: u32,
    ) -> Result<(Session, Vec<Question>)> {
        if waiting == joining {
            return Err(TriviaError::InvalidRequest {
                reason: format!("player '{}' cannot be paired with themselves", waiting),
            }
            .into());
        }

        let questions = self
            .question_bank
            .sample_by_level(level, self.questions_per_session)
            .await?;

        if questions.len() < self.questions_per_session {
            warn!(
                "Question shortage at level {} - available: {}, required: {}",
                level,
                questions.len(),
                self.questions_per_session
            );
            return Err(TriviaError::QuestionShortage {
                level,
                available: questions.len(),
                required: self.questions_per_session,
            }
            .into());
        }

        let session = Session::new(
            [waiting.clone(), joining.clone()],
            level,
            questions.iter().map(|q| q.id).collect(),
        );
        self.session_store.insert(session.clone()).await?;

        info!(
            "Session {} created - level: {}, players: '{}' vs '{}'",
            session.id, level, waiting, joining
        );

        Ok((session, questions))
    }
}
