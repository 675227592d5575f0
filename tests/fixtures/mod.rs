//! Shared fixtures for the integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use trivia_duel::config::AppConfig;
use trivia_duel::gateway::StaticTokenAuthenticator;
use trivia_duel::metrics::MetricsCollector;
use trivia_duel::service::ServiceContext;
use trivia_duel::storage::InMemoryQuestionBank;
use trivia_duel::types::{AnswerSubmission, Player, Question, SessionId};
use uuid::Uuid;

/// Every seeded question has these options; the first is correct
pub const OPTIONS: [&str; 4] = ["A", "B", "C", "D"];
pub const CORRECT: &str = "A";
pub const WRONG: &str = "B";

/// Bank with `count` questions on each listed level
pub fn seeded_bank(levels: &[(u32, usize)]) -> Arc<InMemoryQuestionBank> {
    let bank = InMemoryQuestionBank::new();
    for &(level, count) in levels {
        for n in 0..count {
            bank.insert(Question {
                id: Uuid::new_v4(),
                level,
                text: format!("Level {} question {}", level, n),
                options: OPTIONS.iter().map(|o| o.to_string()).collect(),
                correct_answer: CORRECT.to_string(),
            })
            .expect("valid question");
        }
    }
    Arc::new(bank)
}

/// A running context whose tokens are `"<player>-token"` for each player
pub async fn test_context(
    bank: Arc<InMemoryQuestionBank>,
    players: &[&str],
) -> Arc<ServiceContext> {
    let authenticator = players
        .iter()
        .fold(StaticTokenAuthenticator::new(), |auth, player| {
            auth.with_token(token_for(player), *player)
        });

    let context = Arc::new(ServiceContext::with_components(
        AppConfig::default(),
        bank,
        Arc::new(authenticator),
        Arc::new(MetricsCollector::default()),
    ));
    context.set_running(true).await;
    context
}

/// Register players directly, bypassing the gateway
pub async fn register_players(context: &ServiceContext, players: &[&str]) {
    for player in players {
        context
            .player_store()
            .insert(Player::new(*player, *player))
            .await
            .expect("insert player");
    }
}

pub fn token_for(player: &str) -> String {
    format!("{}-token", player)
}

/// One submission per question, the first `correct` of them right
pub fn answers(question_ids: &[Uuid], correct: usize) -> Vec<AnswerSubmission> {
    question_ids
        .iter()
        .enumerate()
        .map(|(i, question_id)| {
            let (index, text) = if i < correct { (0, CORRECT) } else { (1, WRONG) };
            AnswerSubmission {
                question_id: *question_id,
                selected_index: Some(index),
                selected_answer: text.to_string(),
                response_ms: 1_500 + i as u64 * 100,
            }
        })
        .collect()
}

pub fn session_id_of(body: &Value) -> SessionId {
    body["sessionId"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("sessionId in body")
}

pub fn question_ids_of(body: &Value) -> Vec<Uuid> {
    body["questions"]
        .as_array()
        .expect("questions in body")
        .iter()
        .map(|q| q["id"].as_str().and_then(|s| s.parse().ok()).expect("question id"))
        .collect()
}

/// Send a request through the router and decode the JSON body
pub async fn call(
    router: &Router,
    method: &str,
    uri: &str,
    player: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(player) = player {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token_for(player)));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .expect("request");

    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}
