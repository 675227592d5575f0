//! Polling API handlers
//!
//! Every route requires a bearer token. Domain errors are mapped to status
//! codes in one place, `ApiError`.

use crate::error::{as_trivia_error, TriviaError};
use crate::gateway::messages::{
    ErrorBody, LeaveResponse, SubmitAnswersRequest, UpdateStatsRequest,
};
use crate::gateway::GatewayState;
use crate::queue::{JoinOutcome, LeaveReason, QueueStatus};
use crate::session::{FinalizationReport, SessionResult, SessionView, SubmissionReceipt};
use crate::progression::profile;
use crate::types::{PlayerId, PlayerProfile, SessionId};
use axum::{
    extract::{FromRequestParts, Path, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error, warn};

/// Handler error carrying a domain error
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    /// Status code for the wrapped error
    pub fn status(&self) -> StatusCode {
        match as_trivia_error(&self.0) {
            Some(TriviaError::NotAuthenticated { .. }) => StatusCode::UNAUTHORIZED,
            Some(TriviaError::PlayerNotFound { .. } | TriviaError::SessionNotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            Some(TriviaError::NotAParticipant { .. }) => StatusCode::FORBIDDEN,
            Some(TriviaError::SessionNotActive { .. }) => StatusCode::CONFLICT,
            Some(TriviaError::QuestionShortage { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Some(TriviaError::InvalidRequest { .. }) => StatusCode::BAD_REQUEST,
            Some(
                TriviaError::VersionConflict { .. }
                | TriviaError::ConfigurationError { .. }
                | TriviaError::InternalError { .. },
            )
            | None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match as_trivia_error(&self.0) {
            Some(trivia) if status != StatusCode::INTERNAL_SERVER_ERROR => ErrorBody {
                error: trivia.to_string(),
                code: trivia.code().to_string(),
                retryable: trivia.is_retryable(),
            },
            _ => {
                error!("Request failed: {:#}", self.0);
                ErrorBody {
                    error: "Internal server error".to_string(),
                    code: "internal_error".to_string(),
                    retryable: true,
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// The authenticated caller, resolved to a known player
#[derive(Debug, Clone)]
pub struct AuthenticatedPlayer(pub PlayerId);

impl FromRequestParts<GatewayState> for AuthenticatedPlayer {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GatewayState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| TriviaError::NotAuthenticated {
            reason: "missing bearer token".to_string(),
        })?;

        match state.resolve_player(token).await {
            Ok(player_id) => Ok(Self(player_id)),
            Err(e) => {
                warn!("Rejected request to {}: {}", parts.uri.path(), e);
                Err(e.into())
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// `POST /api/match/join`
pub async fn join_queue(
    State(state): State<GatewayState>,
    AuthenticatedPlayer(player_id): AuthenticatedPlayer,
) -> ApiResult<JoinOutcome> {
    debug!("Join requested by '{}'", player_id);
    Ok(Json(state.matchmaker.join(&player_id, None).await?))
}

/// `GET /api/match/queue-status`
pub async fn queue_status(
    State(state): State<GatewayState>,
    AuthenticatedPlayer(player_id): AuthenticatedPlayer,
) -> ApiResult<QueueStatus> {
    Ok(Json(state.matchmaker.queue_status(&player_id).await?))
}

/// `POST /api/match/leave`
pub async fn leave_queue(
    State(state): State<GatewayState>,
    AuthenticatedPlayer(player_id): AuthenticatedPlayer,
) -> ApiResult<LeaveResponse> {
    let left = state.matchmaker.leave(&player_id, LeaveReason::Cancelled)?;
    Ok(Json(LeaveResponse { left }))
}

/// `GET /api/game/session/{session_id}`
pub async fn session_view(
    State(state): State<GatewayState>,
    AuthenticatedPlayer(player_id): AuthenticatedPlayer,
    Path(session_id): Path<SessionId>,
) -> ApiResult<SessionView> {
    Ok(Json(
        state.aggregator.session_view(&player_id, &session_id).await?,
    ))
}

/// `POST /api/game/submit`
pub async fn submit_answers(
    State(state): State<GatewayState>,
    AuthenticatedPlayer(player_id): AuthenticatedPlayer,
    Json(request): Json<SubmitAnswersRequest>,
) -> ApiResult<SubmissionReceipt> {
    Ok(Json(
        state
            .aggregator
            .submit_answers(&player_id, &request.session_id, request.answers)
            .await?,
    ))
}

/// `GET /api/game/result/{session_id}`
pub async fn session_result(
    State(state): State<GatewayState>,
    AuthenticatedPlayer(player_id): AuthenticatedPlayer,
    Path(session_id): Path<SessionId>,
) -> ApiResult<SessionResult> {
    Ok(Json(
        state.aggregator.get_result(&player_id, &session_id).await?,
    ))
}

/// `POST /api/game/update-player-stats`
pub async fn update_player_stats(
    State(state): State<GatewayState>,
    AuthenticatedPlayer(player_id): AuthenticatedPlayer,
    Json(request): Json<UpdateStatsRequest>,
) -> ApiResult<FinalizationReport> {
    Ok(Json(
        state
            .aggregator
            .finalize_stats(&player_id, &request.session_id, request.outcome)
            .await?,
    ))
}

/// `GET /api/player/me`
pub async fn player_profile(
    State(state): State<GatewayState>,
    AuthenticatedPlayer(player_id): AuthenticatedPlayer,
) -> ApiResult<PlayerProfile> {
    let player = state
        .player_store
        .find_by_id(&player_id)
        .await?
        .ok_or_else(|| TriviaError::PlayerNotFound {
            player_id: player_id.clone(),
        })?;
    Ok(Json(profile(&player)))
}
