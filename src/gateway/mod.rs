//! Client-facing transports: the polling HTTP API and the push gateway
//!
//! Both transports authenticate the caller, resolve them to a player record
//! and then drive the same `Matchmaker` and `ResultAggregator`.

pub mod auth;
pub mod connections;
pub mod http;
pub mod messages;
pub mod server;
pub mod ws;

pub use auth::{HmacTokenAuthenticator, StaticTokenAuthenticator, TokenAuthenticator};
pub use connections::ConnectionRegistry;
pub use server::{HttpServer, HttpServerConfig};

use crate::error::{Result, TriviaError};
use crate::queue::Matchmaker;
use crate::session::ResultAggregator;
use crate::storage::PlayerStore;
use crate::types::{Player, PlayerId};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::info;

/// Shared state of the client-facing routes
#[derive(Clone)]
pub struct GatewayState {
    pub authenticator: Arc<dyn TokenAuthenticator>,
    pub player_store: Arc<dyn PlayerStore>,
    pub matchmaker: Matchmaker,
    pub aggregator: ResultAggregator,
    pub connections: ConnectionRegistry,
    /// Create a player record on first authenticated contact
    pub auto_register_players: bool,
}

impl GatewayState {
    /// Authenticate a token and make sure the player has a record
    pub async fn resolve_player(&self, token: &str) -> Result<PlayerId> {
        let identity = self.authenticator.authenticate(token).await?;

        if self
            .player_store
            .find_by_id(&identity.player_id)
            .await?
            .is_some()
        {
            return Ok(identity.player_id);
        }

        if !self.auto_register_players {
            return Err(TriviaError::PlayerNotFound {
                player_id: identity.player_id,
            }
            .into());
        }

        let username = if identity.username.trim().is_empty() {
            identity.player_id.clone()
        } else {
            identity.username.clone()
        };
        if self
            .player_store
            .insert(Player::new(identity.player_id.clone(), username))
            .await?
        {
            info!("Registered new player '{}'", identity.player_id);
        }
        Ok(identity.player_id)
    }
}

/// Routes of the polling API and the push gateway
pub fn api_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/match/join", post(http::join_queue))
        .route("/api/match/queue-status", get(http::queue_status))
        .route("/api/match/leave", post(http::leave_queue))
        .route("/api/game/session/{session_id}", get(http::session_view))
        .route("/api/game/submit", post(http::submit_answers))
        .route("/api/game/result/{session_id}", get(http::session_result))
        .route(
            "/api/game/update-player-stats",
            post(http::update_player_stats),
        )
        .route("/api/player/me", get(http::player_profile))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}
