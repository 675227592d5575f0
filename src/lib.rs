//! Trivia Duel - real-time 1v1 trivia matchmaking and scoring
//!
//! This crate pairs players of equal level into head-to-head quiz sessions,
//! records answers, decides outcomes and applies XP and level progression
//! exactly once per player per session.

pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod progression;
pub mod queue;
pub mod service;
pub mod session;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{Result, TriviaError};
pub use types::*;

// Re-export key components
pub use queue::{EventPublisher, Matchmaker};
pub use session::{ResultAggregator, SessionFactory};
pub use storage::{InMemoryPlayerStore, InMemoryQuestionBank, PlayerStore, QuestionBank};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
