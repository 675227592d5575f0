//! Utility functions for the trivia duel service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique session ID
pub fn generate_session_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique connection ID
pub fn generate_connection_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Fold `count` new samples with mean `mean` into a running mean over `prior_count` samples
pub fn weighted_mean(prior_mean: f64, prior_count: u64, mean: f64, count: u64) -> f64 {
    let total = prior_count + count;
    if total == 0 {
        return 0.0;
    }
    (prior_mean * prior_count as f64 + mean * count as f64) / total as f64
}
