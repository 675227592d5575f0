//! Health check endpoints and Prometheus metrics export
//!
//! These routes are merged into the main HTTP router next to the API.

use crate::metrics::collector::MetricsCollector;
use crate::service::app::ServiceContext;
use crate::service::health::{HealthCheck, HealthStatus};
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};

/// Shared state for the ops routes
#[derive(Clone)]
pub struct HealthServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    /// Absent until the service is wired
    pub context: Option<Arc<ServiceContext>>,
}

impl HealthServerState {
    fn service_name(&self) -> String {
        self.context
            .as_ref()
            .map(|c| c.config().service.name.clone())
            .unwrap_or_else(|| "trivia-duel".to_string())
    }
}

/// Router with `/`, `/health`, `/ready`, `/alive`, `/metrics` and `/stats`
pub fn health_router(state: HealthServerState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/alive", get(alive_handler))
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
}

/// Root endpoint handler - shows service information
async fn root_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    Json(json!({
        "service": state.service_name(),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/api/match/join",
            "/api/match/queue-status",
            "/api/match/leave",
            "/api/game/session/{session_id}",
            "/api/game/submit",
            "/api/game/result/{session_id}",
            "/api/game/update-player-stats",
            "/api/player/me",
            "/ws",
            "/health",
            "/ready",
            "/alive",
            "/metrics",
            "/stats"
        ]
    }))
}

/// Lightweight health check endpoint handler
async fn health_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Health check requested");

    let service = state.service_name();
    let status = match &state.context {
        Some(context) => HealthCheck::liveness_check(context)
            .await
            .unwrap_or(HealthStatus::Unhealthy),
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": service,
                    "version": env!("CARGO_PKG_VERSION"),
                    "error": "Service not initialized"
                })),
            )
        }
    };

    let code = match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (
        code,
        Json(json!({
            "status": status,
            "service": service,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness check endpoint handler
async fn ready_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Readiness check requested");

    match &state.context {
        Some(context) => match HealthCheck::readiness_check(context).await {
            Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready"),
            Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready"),
            Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
            Err(e) => {
                error!("Readiness check failed: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
            }
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

/// Liveness check endpoint handler
async fn alive_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Liveness check requested");

    match &state.context {
        Some(context) => match HealthCheck::liveness_check(context).await {
            Ok(HealthStatus::Healthy) => (StatusCode::OK, "Alive"),
            _ => (StatusCode::SERVICE_UNAVAILABLE, "Not alive"),
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<HealthServerState>) -> Response {
    debug!("Metrics endpoint requested");

    let metric_families = state.metrics_collector.registry().gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(output) => {
            debug!("Serving {} metric families", metric_families.len());
            (
                StatusCode::OK,
                [(CONTENT_TYPE, encoder.format_type().to_string())],
                output,
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
            )
                .into_response()
        }
    }
}

/// Detailed service statistics endpoint handler
async fn stats_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Stats endpoint requested");

    let Some(context) = &state.context else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "service": {
                    "name": state.service_name(),
                    "version": env!("CARGO_PKG_VERSION"),
                    "status": "error"
                },
                "error": "Service not initialized",
                "timestamp": chrono::Utc::now()
            })),
        );
    };

    match HealthCheck::check(context).await {
        Ok(health) => (
            StatusCode::OK,
            Json(json!({
                "service": {
                    "name": health.service,
                    "version": health.version,
                    "status": health.status,
                    "uptimeSeconds": health.stats.uptime_seconds
                },
                "queue": {
                    "waiting": health.stats.players_waiting,
                    "pendingNotices": health.stats.pending_match_notices,
                    "pairings": health.stats.total_pairings,
                    "pushConnections": health.stats.push_connections
                },
                "sessions": {
                    "active": health.stats.active_sessions,
                    "completed": health.stats.completed_sessions,
                    "pendingFinalization": health.stats.pending_finalization,
                    "answersRecorded": health.stats.answers_recorded
                },
                "players": {
                    "registered": health.stats.registered_players
                },
                "components": health.checks,
                "timestamp": health.timestamp
            })),
        ),
        Err(e) => {
            error!("Failed to get stats: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "service": {
                        "name": state.service_name(),
                        "version": env!("CARGO_PKG_VERSION"),
                        "status": "error"
                    },
                    "error": "Failed to get service stats",
                    "timestamp": chrono::Utc::now()
                })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::gateway::StaticTokenAuthenticator;
    use crate::storage::InMemoryQuestionBank;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt; // for oneshot

    fn uninitialized() -> Router {
        health_router(HealthServerState {
            metrics_collector: Arc::new(MetricsCollector::new().expect("collector")),
            context: None,
        })
    }

    async fn status_of(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        assert_eq!(status_of(uninitialized(), "/").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let collector = Arc::new(MetricsCollector::new().expect("collector"));
        collector.record_session_created();
        collector.update_health_status(2);

        let app = health_router(HealthServerState {
            metrics_collector: collector,
            context: None,
        });
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&body).contains("trivia_duel_sessions_created_total"));
    }

    #[tokio::test]
    async fn test_endpoints_without_context() {
        for uri in ["/health", "/ready", "/alive", "/stats"] {
            assert_eq!(
                status_of(uninitialized(), uri).await,
                StatusCode::SERVICE_UNAVAILABLE,
                "{}",
                uri
            );
        }
    }

    #[tokio::test]
    async fn test_endpoints_with_running_context() {
        let context = Arc::new(ServiceContext::with_components(
            AppConfig::default(),
            Arc::new(InMemoryQuestionBank::new()),
            Arc::new(StaticTokenAuthenticator::new()),
            Arc::new(MetricsCollector::default()),
        ));
        context.set_running(true).await;

        let app = health_router(HealthServerState {
            metrics_collector: context.metrics_collector(),
            context: Some(context),
        });

        assert_eq!(status_of(app.clone(), "/alive").await, StatusCode::OK);
        assert_eq!(status_of(app.clone(), "/health").await, StatusCode::OK);
        assert_eq!(status_of(app.clone(), "/stats").await, StatusCode::OK);
        // An empty question bank cannot serve a session
        assert_eq!(
            status_of(app, "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_404_handling() {
        assert_eq!(
            status_of(uninitialized(), "/nonexistent").await,
            StatusCode::NOT_FOUND
        );
    }
}
