//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the trivia-duel service:
//! queue traffic, session lifecycle, stat finalization and operation latency.

use crate::queue::matchmaker::MatchmakerStats;
use crate::session::result::ResultAggregatorStats;
use crate::types::Outcome;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the trivia duel service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Matchmaking queue metrics
    queue_metrics: QueueMetrics,

    /// Session lifecycle metrics
    session_metrics: SessionMetrics,

    /// Stat finalization metrics
    finalization_metrics: FinalizationMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,

    /// Currently open push connections
    pub push_connections: IntGauge,

    /// Push events delivered or dropped
    pub push_events_total: IntCounterVec,
}

/// Matchmaking queue metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Join requests by result (queued, already_queued, paired, shortage, error)
    pub joins_total: IntCounterVec,

    /// Explicit cancels and disconnect removals
    pub leaves_total: IntCounterVec,

    /// Players currently waiting across all levels
    pub players_waiting: IntGauge,

    /// Pairings by level
    pub pairings_total: IntCounterVec,

    /// Pairings abandoned because a level ran short of questions
    pub question_shortages_total: IntCounterVec,

    /// Time the waiting player spent queued before pairing
    pub wait_time_seconds: Histogram,
}

/// Session lifecycle metrics
#[derive(Clone)]
pub struct SessionMetrics {
    /// Sessions created
    pub sessions_created_total: IntCounter,

    /// Sessions currently active
    pub active_sessions: IntGauge,

    /// Sessions that reached completion
    pub sessions_completed_total: IntCounter,

    /// Answers by result (recorded, skipped)
    pub answers_total: IntCounterVec,

    /// Time from session start to completion
    pub session_duration_seconds: Histogram,
}

/// Stat finalization metrics
#[derive(Clone)]
pub struct FinalizationMetrics {
    /// Per-player finalization attempts by trigger path and result
    pub finalizations_total: IntCounterVec,

    /// Sessions with both players finalized
    pub sessions_finalized_total: IntCounter,

    /// Completed sessions still awaiting finalization
    pub pending_sessions: IntGauge,

    /// XP awarded by outcome
    pub xp_awarded_total: IntCounterVec,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Join processing time
    pub join_duration: Histogram,

    /// Answer submission processing time
    pub submit_duration: Histogram,

    /// Other core operation durations
    pub operation_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let session_metrics = SessionMetrics::new(&registry)?;
        let finalization_metrics = FinalizationMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            session_metrics,
            finalization_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get queue metrics
    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    /// Get session metrics
    pub fn session(&self) -> &SessionMetrics {
        &self.session_metrics
    }

    /// Get finalization metrics
    pub fn finalization(&self) -> &FinalizationMetrics {
        &self.finalization_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Refresh gauges from component stats
    pub fn update_from_stats(&self, matchmaker: &MatchmakerStats, sessions: &ResultAggregatorStats) {
        self.queue_metrics
            .players_waiting
            .set(matchmaker.players_waiting as i64);
        self.session_metrics
            .active_sessions
            .set(sessions.active_sessions as i64);
        self.finalization_metrics
            .pending_sessions
            .set(sessions.pending_finalization as i64);
    }

    /// Record a join request and how long it took
    pub fn record_join(&self, result: &str, duration: Duration) {
        self.queue_metrics
            .joins_total
            .with_label_values(&[result])
            .inc();
        self.performance_metrics
            .join_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a player leaving the queue
    pub fn record_leave(&self, reason: &str) {
        self.queue_metrics
            .leaves_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record a pairing and the waiting player's queue time
    pub fn record_pairing(&self, level: u32, waited: Duration) {
        let level = level.to_string();
        self.queue_metrics
            .pairings_total
            .with_label_values(&[level.as_str()])
            .inc();
        self.queue_metrics
            .wait_time_seconds
            .observe(waited.as_secs_f64());
    }

    /// Record a pairing abandoned for lack of questions
    pub fn record_question_shortage(&self, level: u32) {
        let level = level.to_string();
        self.queue_metrics
            .question_shortages_total
            .with_label_values(&[level.as_str()])
            .inc();
    }

    /// Record a session being created
    pub fn record_session_created(&self) {
        self.session_metrics.sessions_created_total.inc();
        self.session_metrics.active_sessions.inc();
    }

    /// Record a session completing
    pub fn record_session_completed(&self, duration: Duration) {
        self.session_metrics.sessions_completed_total.inc();
        self.session_metrics.active_sessions.dec();
        self.session_metrics
            .session_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Record a submission batch
    pub fn record_submission(&self, recorded: usize, skipped: usize, duration: Duration) {
        self.session_metrics
            .answers_total
            .with_label_values(&["recorded"])
            .inc_by(recorded as u64);
        self.session_metrics
            .answers_total
            .with_label_values(&["skipped"])
            .inc_by(skipped as u64);
        self.performance_metrics
            .submit_duration
            .observe(duration.as_secs_f64());
    }

    /// Record one per-player finalization attempt
    pub fn record_finalization(&self, path: &str, result: &str) {
        self.finalization_metrics
            .finalizations_total
            .with_label_values(&[path, result])
            .inc();
    }

    /// Record a session whose stats are fully applied
    pub fn record_session_finalized(&self) {
        self.finalization_metrics.sessions_finalized_total.inc();
    }

    /// Record XP awarded to a player
    pub fn record_xp_awarded(&self, outcome: Outcome, xp: u64) {
        let outcome = outcome.to_string();
        self.finalization_metrics
            .xp_awarded_total
            .with_label_values(&[outcome.as_str()])
            .inc_by(xp);
    }

    /// Record a push event delivery attempt
    pub fn record_push_event(&self, event: &str, delivered: bool) {
        let status = if delivered { "delivered" } else { "dropped" };
        self.service_metrics
            .push_events_total
            .with_label_values(&[event, status])
            .inc();
    }

    /// Record a core operation duration
    pub fn record_operation(&self, operation: &str, duration: Duration) {
        self.performance_metrics
            .operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("trivia_duel_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "trivia_duel_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("trivia_duel_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        let push_connections = IntGauge::new(
            "trivia_duel_push_connections",
            "Currently open push connections",
        )?;
        registry.register(Box::new(push_connections.clone()))?;

        let push_events_total = IntCounterVec::new(
            Opts::new("trivia_duel_push_events_total", "Push events sent"),
            &["event", "status"],
        )?;
        registry.register(Box::new(push_events_total.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
            push_connections,
            push_events_total,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let joins_total = IntCounterVec::new(
            Opts::new("trivia_duel_queue_joins_total", "Queue join requests"),
            &["result"],
        )?;
        registry.register(Box::new(joins_total.clone()))?;

        let leaves_total = IntCounterVec::new(
            Opts::new("trivia_duel_queue_leaves_total", "Players leaving the queue"),
            &["reason"],
        )?;
        registry.register(Box::new(leaves_total.clone()))?;

        let players_waiting = IntGauge::new(
            "trivia_duel_players_waiting",
            "Players currently waiting in queue",
        )?;
        registry.register(Box::new(players_waiting.clone()))?;

        let pairings_total = IntCounterVec::new(
            Opts::new("trivia_duel_pairings_total", "Players paired into sessions"),
            &["level"],
        )?;
        registry.register(Box::new(pairings_total.clone()))?;

        let question_shortages_total = IntCounterVec::new(
            Opts::new(
                "trivia_duel_question_shortages_total",
                "Pairings abandoned for lack of questions",
            ),
            &["level"],
        )?;
        registry.register(Box::new(question_shortages_total.clone()))?;

        let wait_time_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "trivia_duel_queue_wait_time_seconds",
                "Queue wait time before pairing",
            )
            .buckets(vec![0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        )?;
        registry.register(Box::new(wait_time_seconds.clone()))?;

        Ok(Self {
            joins_total,
            leaves_total,
            players_waiting,
            pairings_total,
            question_shortages_total,
            wait_time_seconds,
        })
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let sessions_created_total =
            IntCounter::new("trivia_duel_sessions_created_total", "Sessions created")?;
        registry.register(Box::new(sessions_created_total.clone()))?;

        let active_sessions =
            IntGauge::new("trivia_duel_active_sessions", "Sessions currently active")?;
        registry.register(Box::new(active_sessions.clone()))?;

        let sessions_completed_total =
            IntCounter::new("trivia_duel_sessions_completed_total", "Sessions completed")?;
        registry.register(Box::new(sessions_completed_total.clone()))?;

        let answers_total = IntCounterVec::new(
            Opts::new("trivia_duel_answers_total", "Submitted answers"),
            &["result"],
        )?;
        registry.register(Box::new(answers_total.clone()))?;

        let session_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "trivia_duel_session_duration_seconds",
                "Time from session start to completion",
            )
            .buckets(vec![10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        )?;
        registry.register(Box::new(session_duration_seconds.clone()))?;

        Ok(Self {
            sessions_created_total,
            active_sessions,
            sessions_completed_total,
            answers_total,
            session_duration_seconds,
        })
    }
}

impl FinalizationMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let finalizations_total = IntCounterVec::new(
            Opts::new(
                "trivia_duel_finalizations_total",
                "Per-player stat finalization attempts",
            ),
            &["path", "result"],
        )?;
        registry.register(Box::new(finalizations_total.clone()))?;

        let sessions_finalized_total = IntCounter::new(
            "trivia_duel_sessions_finalized_total",
            "Sessions with stats applied for both players",
        )?;
        registry.register(Box::new(sessions_finalized_total.clone()))?;

        let pending_sessions = IntGauge::new(
            "trivia_duel_pending_finalization_sessions",
            "Completed sessions awaiting stat finalization",
        )?;
        registry.register(Box::new(pending_sessions.clone()))?;

        let xp_awarded_total = IntCounterVec::new(
            Opts::new("trivia_duel_xp_awarded_total", "Experience awarded"),
            &["outcome"],
        )?;
        registry.register(Box::new(xp_awarded_total.clone()))?;

        Ok(Self {
            finalizations_total,
            sessions_finalized_total,
            pending_sessions,
            xp_awarded_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let join_duration = Histogram::with_opts(
            HistogramOpts::new(
                "trivia_duel_join_duration_seconds",
                "Queue join processing time",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(join_duration.clone()))?;

        let submit_duration = Histogram::with_opts(
            HistogramOpts::new(
                "trivia_duel_submit_duration_seconds",
                "Answer submission processing time",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(submit_duration.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "trivia_duel_operation_duration_seconds",
                "Core operation duration",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            join_duration,
            submit_duration,
            operation_duration,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
