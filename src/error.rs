//! Error types for the trivia duel service
//!
//! Domain failures are raised as `TriviaError` values wrapped in `anyhow::Error`
//! so callers can propagate with `?` and the HTTP layer can recover the kind
//! with `downcast_ref`.

use crate::types::{PlayerId, SessionId};

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking and session scenarios
#[derive(Debug, thiserror::Error)]
pub enum TriviaError {
    #[error("Not authenticated: {reason}")]
    NotAuthenticated { reason: String },

    #[error("Player not found: {player_id}")]
    PlayerNotFound { player_id: PlayerId },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: SessionId },

    #[error("Player {player_id} is not a participant of session {session_id}")]
    NotAParticipant {
        player_id: PlayerId,
        session_id: SessionId,
    },

    #[error("Session {session_id} is not active")]
    SessionNotActive { session_id: SessionId },

    #[error("Not enough questions for level {level}: {available} available, {required} required")]
    QuestionShortage {
        level: u32,
        available: usize,
        required: usize,
    },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Version conflict for player {player_id}: expected {expected}, found {found}")]
    VersionConflict {
        player_id: PlayerId,
        expected: u64,
        found: u64,
    },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl TriviaError {
    /// Whether the client may retry the same request and expect a different outcome
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TriviaError::QuestionShortage { .. }
                | TriviaError::VersionConflict { .. }
                | TriviaError::InternalError { .. }
        )
    }

    /// Short machine-readable code used in API and push payloads
    pub fn code(&self) -> &'static str {
        match self {
            TriviaError::NotAuthenticated { .. } => "not_authenticated",
            TriviaError::PlayerNotFound { .. } => "player_not_found",
            TriviaError::SessionNotFound { .. } => "session_not_found",
            TriviaError::NotAParticipant { .. } => "not_a_participant",
            TriviaError::SessionNotActive { .. } => "session_not_active",
            TriviaError::QuestionShortage { .. } => "question_shortage",
            TriviaError::InvalidRequest { .. } => "invalid_request",
            TriviaError::VersionConflict { .. } => "version_conflict",
            TriviaError::ConfigurationError { .. } => "configuration_error",
            TriviaError::InternalError { .. } => "internal_error",
        }
    }
}

/// Look through an `anyhow::Error` for a domain error
pub fn as_trivia_error(error: &anyhow::Error) -> Option<&TriviaError> {
    error.downcast_ref::<TriviaError>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let shortage = TriviaError::QuestionShortage {
            level: 3,
            available: 4,
            required: 10,
        };
        assert!(shortage.is_retryable());
        assert_eq!(shortage.code(), "question_shortage");

        let forbidden = TriviaError::NotAParticipant {
            player_id: "p1".to_string(),
            session_id: uuid::Uuid::new_v4(),
        };
        assert!(!forbidden.is_retryable());
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = TriviaError::InvalidRequest {
            reason: "answers must not be empty".to_string(),
        }
        .into();

        match as_trivia_error(&err) {
            Some(TriviaError::InvalidRequest { reason }) => {
                assert!(reason.contains("empty"))
            }
            other => panic!("unexpected error kind: {:?}", other),
        }
    }
}
