//! Service layer for the trivia-duel service
//!
//! Component wiring, the HTTP listener, background tasks and health checks.

pub mod app;
pub mod health;

pub use app::{AppState, ServiceContext, ServiceError};
pub use health::{ComponentCheck, HealthCheck, HealthStatus, ServiceStats};
