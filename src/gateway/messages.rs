//! Wire formats for the HTTP and push transports

use crate::error::as_trivia_error;
use crate::queue::{JoinOutcome, MatchFound};
use crate::session::AnswerReceipt;
use crate::types::{AnswerSubmission, Outcome, SessionId};
use serde::{Deserialize, Serialize};

/// Events pushed to a connected client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Queued {
        level: u32,
        position: usize,
    },
    /// Paired; the match follows as `found` once its session exists
    Matching {
        level: u32,
    },
    Found(MatchFound),
    Answered(AnswerReceipt),
    Error {
        message: String,
        code: String,
        retryable: bool,
    },
    Cancelled,
}

impl ServerEvent {
    /// Event name used in logs and metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Queued { .. } => "queued",
            ServerEvent::Matching { .. } => "matching",
            ServerEvent::Found(_) => "found",
            ServerEvent::Answered(_) => "answered",
            ServerEvent::Error { .. } => "error",
            ServerEvent::Cancelled => "cancelled",
        }
    }

    /// Build an error event from a failed operation
    pub fn from_error(err: &anyhow::Error) -> Self {
        match as_trivia_error(err) {
            Some(trivia) => ServerEvent::Error {
                message: trivia.to_string(),
                code: trivia.code().to_string(),
                retryable: trivia.is_retryable(),
            },
            None => ServerEvent::Error {
                message: "Internal server error".to_string(),
                code: "internal_error".to_string(),
                retryable: true,
            },
        }
    }
}

impl From<JoinOutcome> for ServerEvent {
    fn from(outcome: JoinOutcome) -> Self {
        match outcome {
            JoinOutcome::Queued { level, position }
            | JoinOutcome::AlreadyQueued { level, position } => {
                ServerEvent::Queued { level, position }
            }
            JoinOutcome::Matching { level } => ServerEvent::Matching { level },
            JoinOutcome::Matched(found) => ServerEvent::Found(found),
        }
    }
}

/// Messages accepted from a connected client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join,
    Cancel,
    /// One answer of an active session
    #[serde(rename_all = "camelCase")]
    Answer {
        session_id: SessionId,
        answer: AnswerSubmission,
    },
}

/// Body of `POST /api/game/submit`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswersRequest {
    pub session_id: SessionId,
    pub answers: Vec<AnswerSubmission>,
}

/// Body of `POST /api/game/update-player-stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatsRequest {
    pub session_id: SessionId,
    /// Client's view of its outcome; advisory
    #[serde(default)]
    pub outcome: Option<Outcome>,
}

/// Body of `POST /api/match/leave`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveResponse {
    pub left: bool,
}

/// Error payload of every failed API call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    pub retryable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TriviaError;
    use serde_json::json;

    #[test]
    fn test_client_messages() {
        let join: ClientMessage = serde_json::from_value(json!({"type": "join"})).unwrap();
        assert_eq!(join, ClientMessage::Join);
        let cancel: ClientMessage = serde_json::from_str(r#"{"type":"cancel"}"#).unwrap();
        assert_eq!(cancel, ClientMessage::Cancel);
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"dance"}"#).is_err());

        let answer: ClientMessage = serde_json::from_value(json!({
            "type": "answer",
            "sessionId": "6f1b3c1e-8d44-4f0e-9a51-2d3c4b5a6978",
            "answer": {"questionId": "0b4c3a2e-1f5d-4c6b-8a7e-9d0c1b2a3f4e", "selectedAnswer": "Paris", "responseMs": 1200}
        }))
        .unwrap();
        let ClientMessage::Answer { answer, .. } = answer else {
            panic!("expected an answer message");
        };
        assert_eq!(answer.selected_answer, "Paris");
        assert_eq!(answer.response_ms, 1200);
    }

    #[test]
    fn test_server_event_tags() {
        let queued = serde_json::to_value(ServerEvent::Queued {
            level: 2,
            position: 0,
        })
        .unwrap();
        assert_eq!(queued, json!({"type": "queued", "level": 2, "position": 0}));

        let matching = serde_json::to_value(ServerEvent::from(JoinOutcome::Matching { level: 3 }))
            .unwrap();
        assert_eq!(matching, json!({"type": "matching", "level": 3}));

        let cancelled = serde_json::to_value(ServerEvent::Cancelled).unwrap();
        assert_eq!(cancelled, json!({"type": "cancelled"}));
    }

    #[test]
    fn test_error_event_from_domain_error() {
        let err: anyhow::Error = TriviaError::QuestionShortage {
            level: 4,
            available: 3,
            required: 10,
        }
        .into();

        match ServerEvent::from_error(&err) {
            ServerEvent::Error {
                code, retryable, ..
            } => {
                assert_eq!(code, "question_shortage");
                assert!(retryable);
            }
            other => panic!("unexpected event {:?}", other),
        }

        let opaque = ServerEvent::from_error(&anyhow::anyhow!("boom"));
        assert_eq!(opaque.name(), "error");
    }

    #[test]
    fn test_submit_request_defaults() {
        let request: SubmitAnswersRequest = serde_json::from_value(json!({
            "sessionId": "6f1b3c1e-8d44-4f0e-9a51-2d3c4b5a6978",
            "answers": [{"questionId": "0b4c3a2e-1f5d-4c6b-8a7e-9d0c1b2a3f4e", "selectedAnswer": "Paris"}]
        }))
        .unwrap();
        assert_eq!(request.answers[0].response_ms, 0);
        assert_eq!(request.answers[0].selected_index, None);
    }
}
