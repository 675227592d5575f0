//! Question bank interface and the in-memory implementation
//!
//! Questions are immutable and tagged by level. The bank can be seeded from a
//! JSON document of the form
//! `{"levels":[{"level":1,"questions":[{"id":1,"question":"..","options":[..],"correctAnswer":".."}]}]}`.

use crate::error::{Result, TriviaError};
use crate::types::{Question, QuestionId};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Trait for question bank access
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Uniform random sample without replacement. May return fewer than `count`.
    async fn sample_by_level(&self, level: u32, count: usize) -> Result<Vec<Question>>;

    /// Fetch questions by ID, preserving the order of `ids` and skipping unknown IDs
    async fn get_many(&self, ids: &[QuestionId]) -> Result<Vec<Question>>;

    /// Number of questions available at a level
    async fn count_by_level(&self, level: u32) -> Result<usize>;
}

#[derive(Debug, Deserialize)]
struct SeedDocument {
    levels: Vec<SeedLevel>,
}

#[derive(Debug, Deserialize)]
struct SeedLevel {
    level: u32,
    questions: Vec<SeedQuestion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedQuestion {
    #[serde(default)]
    id: Option<serde_json::Value>,
    question: String,
    options: Vec<String>,
    correct_answer: String,
}

#[derive(Debug, Default)]
struct BankState {
    by_level: HashMap<u32, Vec<Question>>,
    by_id: HashMap<QuestionId, Question>,
}

/// In-memory question bank
#[derive(Debug, Default)]
pub struct InMemoryQuestionBank {
    state: RwLock<BankState>,
}

impl InMemoryQuestionBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bank from a seed JSON document
    pub fn from_seed_str(raw: &str) -> Result<Self> {
        let document: SeedDocument =
            serde_json::from_str(raw).map_err(|e| TriviaError::ConfigurationError {
                message: format!("Invalid question seed document: {}", e),
            })?;

        let bank = Self::new();
        for level in document.levels {
            for seed in level.questions {
                let source_id = seed
                    .id
                    .as_ref()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "?".to_string());

                let question = Question {
                    id: Uuid::new_v4(),
                    level: level.level,
                    text: seed.question,
                    options: seed.options,
                    correct_answer: seed.correct_answer,
                };

                bank.insert(question).map_err(|e| TriviaError::ConfigurationError {
                    message: format!(
                        "Invalid seed question {} at level {}: {}",
                        source_id, level.level, e
                    ),
                })?;
            }
        }

        let counts = bank.level_counts()?;
        info!(
            "Question bank seeded - levels: {}, questions: {}",
            counts.len(),
            counts.values().sum::<usize>()
        );
        for (level, count) in &counts {
            info!("  Level {}: {} questions", level, count);
        }

        Ok(bank)
    }

    /// Build a bank from a seed JSON file
    pub fn from_seed_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| TriviaError::ConfigurationError {
            message: format!("Failed to read question seed {}: {}", path.display(), e),
        })?;
        Self::from_seed_str(&raw)
    }

    /// Add a validated question
    pub fn insert(&self, question: Question) -> Result<()> {
        if question.level == 0 {
            return Err(TriviaError::InvalidRequest {
                reason: "question level must be at least 1".to_string(),
            }
            .into());
        }
        if question.options.len() < 2 {
            return Err(TriviaError::InvalidRequest {
                reason: format!("question '{}' needs at least 2 options", question.text),
            }
            .into());
        }
        if question.correct_index().is_none() {
            return Err(TriviaError::InvalidRequest {
                reason: format!(
                    "correct answer '{}' of question '{}' is not among its options",
                    question.correct_answer, question.text
                ),
            }
            .into());
        }

        let matching = question
            .options
            .iter()
            .filter(|option| **option == question.correct_answer)
            .count();
        if matching > 1 {
            warn!(
                "Question '{}' lists its correct answer '{}' {} times; the first option is canonical",
                question.text, question.correct_answer, matching
            );
        }

        let mut state = self.state.write().map_err(|_| TriviaError::InternalError {
            message: "Failed to acquire question bank write lock".to_string(),
        })?;

        state
            .by_level
            .entry(question.level)
            .or_default()
            .push(question.clone());
        state.by_id.insert(question.id, question);
        Ok(())
    }

    /// Question count per level, ordered by level
    pub fn level_counts(&self) -> Result<BTreeMap<u32, usize>> {
        let state = self.state.read().map_err(|_| TriviaError::InternalError {
            message: "Failed to acquire question bank read lock".to_string(),
        })?;

        Ok(state
            .by_level
            .iter()
            .map(|(level, questions)| (*level, questions.len()))
            .collect())
    }
}

#[async_trait]
impl QuestionBank for InMemoryQuestionBank {
    async fn sample_by_level(&self, level: u32, count: usize) -> Result<Vec<Question>> {
        let state = self.state.read().map_err(|_| TriviaError::InternalError {
            message: "Failed to acquire question bank read lock".to_string(),
        })?;

        let Some(bucket) = state.by_level.get(&level) else {
            return Ok(Vec::new());
        };

        let mut rng = rand::thread_rng();
        let mut sample: Vec<Question> = bucket.choose_multiple(&mut rng, count).cloned().collect();
        sample.shuffle(&mut rng);
        Ok(sample)
    }

    async fn get_many(&self, ids: &[QuestionId]) -> Result<Vec<Question>> {
        let state = self.state.read().map_err(|_| TriviaError::InternalError {
            message: "Failed to acquire question bank read lock".to_string(),
        })?;

        Ok(ids
            .iter()
            .filter_map(|id| state.by_id.get(id).cloned())
            .collect())
    }

    async fn count_by_level(&self, level: u32) -> Result<usize> {
        let state = self.state.read().map_err(|_| TriviaError::InternalError {
            message: "Failed to acquire question bank read lock".to_string(),
        })?;

        Ok(state.by_level.get(&level).map_or(0, Vec::len))
    }
}
