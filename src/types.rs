//! Common types used throughout the trivia duel service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for players, as issued by the identity provider
pub type PlayerId = String;

/// Unique identifier for game sessions
pub type SessionId = Uuid;

/// Unique identifier for questions
pub type QuestionId = Uuid;

/// Unique identifier for a live push connection
pub type ConnectionId = Uuid;

/// Number of questions in every session
pub const QUESTIONS_PER_SESSION: usize = 10;

/// Cumulative per-player statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub games_played: u64,
    pub wins: u64,
    pub correct_answers: u64,
    pub total_answers: u64,
    /// Answer-weighted running mean of response time
    pub avg_response_ms: f64,
}

/// Durable player record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    /// Never decreases
    pub experience: u64,
    /// Cached `floor(experience / 200) + 1`
    pub level: u32,
    pub win_streak: u32,
    pub stats: PlayerStats,
    /// Optimistic concurrency token, bumped on every save
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Player {
    /// Create a fresh level-1 player
    pub fn new(id: impl Into<PlayerId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            experience: 0,
            level: 1,
            win_streak: 0,
            stats: PlayerStats::default(),
            version: 0,
            created_at: Utc::now(),
        }
    }

    /// Public view shared with opponents
    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            id: self.id.clone(),
            username: self.username.clone(),
            level: self.level,
            experience: self.experience,
        }
    }
}

/// A player's own view of their record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub id: PlayerId,
    pub username: String,
    pub level: u32,
    pub experience: u64,
    pub xp_to_next_level: u64,
    pub win_streak: u32,
    pub stats: PlayerStats,
    pub created_at: DateTime<Utc>,
}

/// Identity-safe subset of a player shown to other participants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub username: String,
    pub level: u32,
    pub experience: u64,
}

/// Multiple-choice question from the question bank
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub level: u32,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

impl Question {
    /// Correctness is decided by exact, case-sensitive text equality
    pub fn is_correct(&self, selected_answer: &str) -> bool {
        self.correct_answer == selected_answer
    }

    /// Index of the first option matching the correct answer text
    pub fn correct_index(&self) -> Option<usize> {
        self.options
            .iter()
            .position(|option| *option == self.correct_answer)
    }

    /// Client-facing view without the answer
    pub fn public_view(&self) -> PublicQuestion {
        PublicQuestion {
            id: self.id,
            text: self.text.clone(),
            options: self.options.clone(),
        }
    }
}

/// Question as sent to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<String>,
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Result of a session from one player's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl Outcome {
    /// Outcome for the player with `own_correct` against `opponent_correct`.
    ///
    /// Only correct counts matter; response time never breaks a tie.
    pub fn resolve(own_correct: u32, opponent_correct: u32) -> Self {
        match own_correct.cmp(&opponent_correct) {
            std::cmp::Ordering::Greater => Outcome::Win,
            std::cmp::Ordering::Less => Outcome::Loss,
            std::cmp::Ordering::Equal => Outcome::Draw,
        }
    }

    /// The same result seen from the other seat
    pub fn mirrored(self) -> Self {
        match self {
            Outcome::Win => Outcome::Loss,
            Outcome::Loss => Outcome::Win,
            Outcome::Draw => Outcome::Draw,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Win => write!(f, "win"),
            Outcome::Loss => write!(f, "loss"),
            Outcome::Draw => write!(f, "draw"),
        }
    }
}

/// A player's recorded answer to one session question
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub question_id: QuestionId,
    pub selected_index: Option<usize>,
    pub selected_answer: String,
    pub correct: bool,
    pub response_ms: u64,
    pub answered_at: DateTime<Utc>,
}

/// One answer as submitted by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    pub question_id: QuestionId,
    #[serde(default)]
    pub selected_index: Option<usize>,
    pub selected_answer: String,
    #[serde(default)]
    pub response_ms: u64,
}

/// Per-player aggregate over a session's answers
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCounts {
    pub total: u32,
    pub correct: u32,
    pub avg_response_ms: f64,
}

/// Claims carried by a validated bearer credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub player_id: PlayerId,
    pub username: String,
    /// Advisory only; pairing always recomputes from experience
    #[serde(default)]
    pub level: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_question() -> Question {
        Question {
            id: Uuid::new_v4(),
            level: 1,
            text: "Capital of France?".to_string(),
            options: vec![
                "Berlin".to_string(),
                "Paris".to_string(),
                "Madrid".to_string(),
                "Paris".to_string(),
            ],
            correct_answer: "Paris".to_string(),
        }
    }

    #[test]
    fn test_correctness_is_exact_text_match() {
        let question = sample_question();
        assert!(question.is_correct("Paris"));
        assert!(!question.is_correct("paris"));
        assert!(!question.is_correct("Paris "));
    }

    #[test]
    fn test_duplicate_correct_text_uses_first_index() {
        assert_eq!(sample_question().correct_index(), Some(1));
    }

    #[test]
    fn test_public_view_hides_answer() {
        let json = serde_json::to_value(sample_question().public_view()).unwrap();
        assert!(json.get("correctAnswer").is_none());
        assert_eq!(json["options"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_outcome_symmetry() {
        assert_eq!(Outcome::resolve(7, 7), Outcome::Draw);
        assert_eq!(Outcome::resolve(8, 5), Outcome::Win);
        assert_eq!(Outcome::resolve(5, 8), Outcome::Loss);
        assert_eq!(Outcome::resolve(0, 10), Outcome::Loss);
        assert_eq!(Outcome::resolve(10, 0).mirrored(), Outcome::Loss);
        assert_eq!(Outcome::Draw.mirrored(), Outcome::Draw);
    }

    #[test]
    fn test_outcome_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Outcome::Win).unwrap(), "\"win\"");
        assert_eq!(
            serde_json::to_string(&SessionStatus::Completed).unwrap(),
            "\"completed\""
        );
    }
}
