//! Metrics and monitoring for the trivia-duel service
//!
//! Prometheus metric families grouped by concern, and the ops routes that
//! expose them together with health and statistics.

pub mod collector;
pub mod health;

pub use collector::{
    FinalizationMetrics, MetricsCollector, MetricsTimer, PerformanceMetrics, QueueMetrics,
    ServiceMetrics, SessionMetrics,
};
pub use health::{health_router, HealthServerState};
