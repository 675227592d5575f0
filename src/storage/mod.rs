//! Storage interfaces for players and questions
//!
//! Both are external collaborators of the core; the in-memory implementations
//! back the service and the tests.

pub mod player;
pub mod question;

pub use player::{update_player, InMemoryPlayerStore, PlayerStore};
pub use question::{InMemoryQuestionBank, QuestionBank};
