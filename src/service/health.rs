//! Health checks and service statistics
//!
//! Readiness requires a running service and a question bank able to fill at
//! least one session; liveness only requires a running service.

use crate::service::app::ServiceContext;
use crate::types::QUESTIONS_PER_SESSION;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Sessions waiting for finalization before the aggregator reports degraded
const PENDING_FINALIZATION_DEGRADED: usize = 1_000;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional detail when not healthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub players_waiting: usize,
    pub pending_match_notices: usize,
    pub total_pairings: u64,
    pub active_sessions: usize,
    pub completed_sessions: usize,
    pub pending_finalization: usize,
    pub answers_recorded: usize,
    pub push_connections: usize,
    pub registered_players: usize,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(context: &ServiceContext) -> Result<Self> {
        let checks = vec![
            Self::check_service_running(context).await,
            Self::check_question_bank(context),
            Self::check_matchmaker(context),
            Self::check_aggregator(context).await,
        ];

        let status = Self::combine(&checks);
        let stats = Self::gather_service_stats(context).await;

        Ok(HealthCheck {
            status,
            service: context.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(context: &ServiceContext) -> Result<HealthStatus> {
        if context.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can handle requests
    pub async fn readiness_check(context: &ServiceContext) -> Result<HealthStatus> {
        if !context.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::combine(&[
            Self::check_question_bank(context),
            Self::check_matchmaker(context),
        ]))
    }

    fn combine(checks: &[ComponentCheck]) -> HealthStatus {
        if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    async fn check_service_running(context: &ServiceContext) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if context.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Unhealthy when empty, degraded when no level can fill a session
    fn check_question_bank(context: &ServiceContext) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match context.question_bank().level_counts() {
            Ok(counts) if counts.is_empty() => (
                HealthStatus::Unhealthy,
                Some("Question bank is empty".to_string()),
            ),
            Ok(counts) => {
                let short: Vec<u32> = counts
                    .iter()
                    .filter(|(_, count)| **count < QUESTIONS_PER_SESSION)
                    .map(|(level, _)| *level)
                    .collect();
                if short.len() == counts.len() {
                    (
                        HealthStatus::Degraded,
                        Some("No level has enough questions for a session".to_string()),
                    )
                } else if !short.is_empty() {
                    (
                        HealthStatus::Healthy,
                        Some(format!("Levels short of questions: {:?}", short)),
                    )
                } else {
                    (HealthStatus::Healthy, None)
                }
            }
            Err(e) => {
                error!("Question bank check failed: {}", e);
                (HealthStatus::Unhealthy, Some(e.to_string()))
            }
        };

        ComponentCheck {
            name: "question_bank".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_matchmaker(context: &ServiceContext) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match context.matchmaker().get_stats() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Matchmaker stats check failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    Some(format!("Stats check failed: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "matchmaker".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn check_aggregator(context: &ServiceContext) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match context.aggregator().get_stats().await {
            Ok(stats) if stats.pending_finalization > PENDING_FINALIZATION_DEGRADED => (
                HealthStatus::Degraded,
                Some(format!(
                    "{} sessions waiting for stat finalization",
                    stats.pending_finalization
                )),
            ),
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Result aggregator stats check failed: {}", e);
                (
                    HealthStatus::Degraded,
                    Some(format!("Stats check failed: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "result_aggregator".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Gather current service statistics
    async fn gather_service_stats(context: &ServiceContext) -> ServiceStats {
        let mut stats = ServiceStats {
            push_connections: context.connections().len(),
            uptime_seconds: context.uptime().as_secs(),
            ..ServiceStats::default()
        };

        match context.matchmaker().get_stats() {
            Ok(matchmaker) => {
                stats.players_waiting = matchmaker.players_waiting;
                stats.pending_match_notices = matchmaker.pending_notices;
                stats.total_pairings = matchmaker.pairings;
            }
            Err(e) => debug!("Failed to get matchmaker stats for health check: {}", e),
        }

        match context.aggregator().get_stats().await {
            Ok(sessions) => {
                stats.active_sessions = sessions.active_sessions;
                stats.completed_sessions = sessions.completed_sessions;
                stats.pending_finalization = sessions.pending_finalization;
                stats.answers_recorded = sessions.answers_recorded;
            }
            Err(e) => debug!("Failed to get session stats for health check: {}", e),
        }

        match context.player_store().count().await {
            Ok(count) => stats.registered_players = count,
            Err(e) => debug!("Failed to count players for health check: {}", e),
        }

        stats
    }
}

impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
