//! Main application state and service coordination
//!
//! `ServiceContext` wires the stores, matchmaker, aggregator and gateway
//! together. `AppState` owns a context plus the HTTP listener and the
//! background tasks that keep gauges fresh and converge stat finalization.

use crate::config::AppConfig;
use crate::gateway::{
    api_router, ConnectionRegistry, GatewayState, HmacTokenAuthenticator, HttpServer,
    HttpServerConfig, TokenAuthenticator,
};
use crate::metrics::health::{health_router, HealthServerState};
use crate::metrics::MetricsCollector;
use crate::queue::Matchmaker;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::session::{
    AnswerLedger, InMemoryAnswerLedger, InMemorySessionStore, ResultAggregator, SessionFactory,
    SessionStore,
};
use crate::storage::{InMemoryPlayerStore, InMemoryQuestionBank, PlayerStore, QuestionBank};
use axum::Router;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Wired service components shared by the routes and background tasks
pub struct ServiceContext {
    config: AppConfig,
    player_store: Arc<dyn PlayerStore>,
    question_bank: Arc<InMemoryQuestionBank>,
    authenticator: Arc<dyn TokenAuthenticator>,
    matchmaker: Matchmaker,
    aggregator: ResultAggregator,
    connections: ConnectionRegistry,
    metrics_collector: Arc<MetricsCollector>,
    is_running: Arc<RwLock<bool>>,
    started_at: Instant,
}

impl ServiceContext {
    /// Build the context from configuration, loading the question bank
    pub fn build(config: AppConfig) -> Result<Self, ServiceError> {
        let question_bank = Arc::new(Self::load_question_bank(&config)?);
        let authenticator = Arc::new(HmacTokenAuthenticator::new(&config.auth.token_secret));
        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        Ok(Self::with_components(
            config,
            question_bank,
            authenticator,
            metrics_collector,
        ))
    }

    /// Wire the context around an existing question bank and authenticator
    pub fn with_components(
        config: AppConfig,
        question_bank: Arc<InMemoryQuestionBank>,
        authenticator: Arc<dyn TokenAuthenticator>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        let player_store: Arc<dyn PlayerStore> = Arc::new(InMemoryPlayerStore::new());
        let session_store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let ledger: Arc<dyn AnswerLedger> = Arc::new(InMemoryAnswerLedger::new());
        let bank: Arc<dyn QuestionBank> = question_bank.clone();
        let connections = ConnectionRegistry::new(metrics_collector.clone());
        let retries = config.matchmaking.max_version_retries;

        let factory = SessionFactory::new(bank.clone(), session_store.clone());
        let matchmaker = Matchmaker::with_metrics(
            factory,
            player_store.clone(),
            Arc::new(connections.clone()),
            metrics_collector.clone(),
        )
        .with_version_retries(retries)
        .with_notice_ttl(config.match_notice_ttl());
        let aggregator = ResultAggregator::with_metrics(
            session_store,
            ledger,
            player_store.clone(),
            bank,
            metrics_collector.clone(),
        )
        .with_version_retries(retries);

        Self {
            config,
            player_store,
            question_bank,
            authenticator,
            matchmaker,
            aggregator,
            connections,
            metrics_collector,
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        }
    }

    fn load_question_bank(config: &AppConfig) -> Result<InMemoryQuestionBank, ServiceError> {
        let Some(path) = &config.storage.question_bank_path else {
            warn!("No question bank configured, every pairing will report a shortage");
            return Ok(InMemoryQuestionBank::new());
        };

        let bank =
            InMemoryQuestionBank::from_seed_file(path).map_err(|e| ServiceError::Configuration {
                message: format!(
                    "Failed to load question bank from {}: {}",
                    path.display(),
                    e
                ),
            })?;

        match bank.level_counts() {
            Ok(counts) => info!(
                "Question bank loaded from {} - {:?}",
                path.display(),
                counts
            ),
            Err(e) => warn!("Question bank loaded but could not be summarized: {}", e),
        }
        Ok(bank)
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn player_store(&self) -> Arc<dyn PlayerStore> {
        self.player_store.clone()
    }

    pub fn question_bank(&self) -> Arc<InMemoryQuestionBank> {
        self.question_bank.clone()
    }

    pub fn matchmaker(&self) -> &Matchmaker {
        &self.matchmaker
    }

    pub fn aggregator(&self) -> &ResultAggregator {
        &self.aggregator
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn set_running(&self, running: bool) {
        *self.is_running.write().await = running;
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// State for the client-facing routes
    pub fn gateway_state(&self) -> GatewayState {
        GatewayState {
            authenticator: self.authenticator.clone(),
            player_store: self.player_store.clone(),
            matchmaker: self.matchmaker.clone(),
            aggregator: self.aggregator.clone(),
            connections: self.connections.clone(),
            auto_register_players: self.config.auth.auto_register_players,
        }
    }

    /// API, push gateway and ops routes in one router
    pub fn router(self: &Arc<Self>) -> Router {
        api_router(self.gateway_state()).merge(health_router(HealthServerState {
            metrics_collector: self.metrics_collector.clone(),
            context: Some(self.clone()),
        }))
    }

    /// Refresh queue and session gauges from component stats
    pub async fn refresh_metrics(&self) -> crate::error::Result<()> {
        let matchmaker_stats = self.matchmaker.get_stats()?;
        let aggregator_stats = self.aggregator.get_stats().await?;
        debug!(
            "Updating metrics - waiting: {}, active sessions: {}, pending finalization: {}",
            matchmaker_stats.players_waiting,
            aggregator_stats.active_sessions,
            aggregator_stats.pending_finalization
        );
        self.metrics_collector
            .update_from_stats(&matchmaker_stats, &aggregator_stats);
        Ok(())
    }
}

/// Main application state containing all service components
pub struct AppState {
    context: Arc<ServiceContext>,

    /// HTTP listener for API, push and ops routes
    http_server: Arc<HttpServer>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing trivia-duel service");
        info!(
            "Configuration: service={}, bind={}",
            config.service.name,
            config.bind_address()
        );

        let http_config = HttpServerConfig {
            host: config.server.host.clone(),
            port: config.server.http_port,
        };
        let context = Arc::new(ServiceContext::build(config)?);
        let http_server = Arc::new(HttpServer::new(http_config, context.router()));

        Ok(Self {
            context,
            http_server,
            background_tasks: Vec::new(),
        })
    }

    /// Start the HTTP listener and background tasks
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting trivia-duel service");

        self.context.set_running(true).await;
        self.start_http_server().await?;
        self.start_background_tasks().await?;

        info!("✅ Trivia-duel service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of trivia-duel service");

        self.context.set_running(false).await;

        if let Err(e) = self.http_server.stop().await {
            warn!("Failed to stop HTTP server: {}", e);
        } else {
            info!("✅ HTTP server stopped");
        }

        self.stop_background_tasks().await;

        // Apply whatever stats are still pending before the in-memory state goes away
        let batch = self.context.config().matchmaking.finalization_batch_size;
        match self.context.aggregator().sweep_pending(batch).await {
            Ok(0) => debug!("No sessions pending finalization at shutdown"),
            Ok(finalized) => info!("Finalized {} sessions during shutdown", finalized),
            Err(e) => warn!("Final finalization sweep failed: {}", e),
        }

        let matchmaker_stats =
            self.context
                .matchmaker()
                .get_stats()
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })?;
        let aggregator_stats = self.context.aggregator().get_stats().await.map_err(|e| {
            ServiceError::BackgroundTask {
                message: format!("Failed to get final stats: {}", e),
            }
        })?;

        info!(
            "Final service statistics: {:?} {:?}",
            matchmaker_stats, aggregator_stats
        );
        info!("✅ Trivia-duel service shutdown completed");

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        self.context.config()
    }

    /// Shared service components
    pub fn context(&self) -> Arc<ServiceContext> {
        self.context.clone()
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        self.context.is_running().await
    }

    async fn start_http_server(&mut self) -> Result<(), ServiceError> {
        let http_server = self.http_server.clone();
        let address = self.context.config().bind_address();

        let handle = tokio::spawn(async move {
            if let Err(e) = http_server.start().await {
                error!("HTTP server failed: {:#}", e);
            } else {
                info!("HTTP server task completed");
            }
        });
        self.background_tasks.push(handle);

        // Give the listener a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("✅ HTTP server started on {}", address);
        Ok(())
    }

    /// Start background maintenance tasks
    async fn start_background_tasks(&mut self) -> Result<(), ServiceError> {
        info!("Starting background maintenance tasks...");

        let sweep_interval = self.context.config().finalization_sweep_interval();
        info!(
            "Starting finalization sweep task ({}s interval)...",
            sweep_interval.as_secs()
        );
        let sweep_task = {
            let context = self.context.clone();
            let batch = context.config().matchmaking.finalization_batch_size;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(sweep_interval);
                info!("Finalization sweep task started");

                while context.is_running().await {
                    interval.tick().await;

                    match context.aggregator().sweep_pending(batch).await {
                        Ok(finalized) => debug!(
                            "Finalization sweep completed - {} sessions finalized",
                            finalized
                        ),
                        Err(e) => warn!("Finalization sweep failed: {}", e),
                    }
                    if let Err(e) = context.matchmaker().prune_notices() {
                        warn!("Match notice pruning failed: {}", e);
                    }
                }

                info!("Finalization sweep task stopped");
            })
        };

        let metrics_interval = self.context.config().metrics_interval();
        info!(
            "Starting metrics update task ({}s interval)...",
            metrics_interval.as_secs()
        );
        let metrics_task = {
            let context = self.context.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(metrics_interval);
                info!("Metrics update task started");

                while context.is_running().await {
                    interval.tick().await;

                    if let Err(e) = context.refresh_metrics().await {
                        warn!("Failed to refresh metrics: {}", e);
                    }
                }

                info!("Metrics update task stopped");
            })
        };

        info!("Starting health metrics task (60s interval)...");
        let health_metrics_task = {
            let context = self.context.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                info!("Health metrics task started");

                while context.is_running().await {
                    interval.tick().await;

                    let collector = context.metrics_collector();
                    collector
                        .service()
                        .uptime_seconds
                        .set(context.uptime().as_secs() as i64);

                    match HealthCheck::check(&context).await {
                        Ok(health) => {
                            collector.update_health_status(match health.status {
                                HealthStatus::Healthy => 2,
                                HealthStatus::Degraded => 1,
                                HealthStatus::Unhealthy => 0,
                            });
                            for check in &health.checks {
                                collector.update_component_health(
                                    &check.name,
                                    check.status != HealthStatus::Unhealthy,
                                );
                            }
                        }
                        Err(e) => {
                            warn!("Health check for metrics failed: {}", e);
                            collector.update_health_status(0);
                        }
                    }
                }

                info!("Health metrics task stopped");
            })
        };

        self.background_tasks.push(sweep_task);
        self.background_tasks.push(metrics_task);
        self.background_tasks.push(health_metrics_task);

        info!("3 background maintenance tasks started successfully");
        Ok(())
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in self.background_tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        info!("✅ All {} background tasks stopped", task_count);
    }
}
