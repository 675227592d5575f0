//! Integration tests for the trivia-duel service
//!
//! These tests drive the full HTTP surface through the router, covering:
//! - Matchmaking with a polling waiter
//! - Answer submission, completion and results
//! - Exactly-once stat finalization
//! - Authentication and membership errors
//! - Question shortages
//! - The caller's profile

mod fixtures;

use axum::http::StatusCode;
use serde_json::json;

use fixtures::{answers, call, question_ids_of, seeded_bank, session_id_of, test_context};

#[tokio::test]
async fn test_complete_duel_workflow() {
    let context = test_context(seeded_bank(&[(1, 15)]), &["alice", "bob"]).await;
    let router = context.router();

    // Step 1: alice queues, bob pairs with her
    let (status, body) = call(&router, "POST", "/api/match/join", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "queued");
    assert_eq!(body["level"], 1);
    assert_eq!(body["position"], 0);

    let (status, body) = call(&router, "POST", "/api/match/join", Some("bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "matched");
    assert_eq!(body["players"]["you"]["id"], "bob");
    assert_eq!(body["players"]["opponent"]["id"], "alice");
    let session_id = session_id_of(&body);
    let question_ids = question_ids_of(&body);
    assert_eq!(question_ids.len(), 10);
    assert!(body["questions"][0].get("correctAnswer").is_none());

    // Step 2: alice learns about the match from her next poll, once
    let (_, status_body) = call(&router, "GET", "/api/match/queue-status", Some("alice"), None).await;
    assert_eq!(status_body["queued"], false);
    assert_eq!(session_id_of(&status_body["matched"]), session_id);

    let (_, status_body) = call(&router, "GET", "/api/match/queue-status", Some("alice"), None).await;
    assert!(status_body["matched"].is_null());

    // Step 3: both load the session and answer
    let uri = format!("/api/game/session/{}", session_id);
    let (status, view) = call(&router, "GET", &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "active");
    assert_eq!(view["players"]["opponent"]["id"], "bob");
    assert_eq!(question_ids_of(&view), question_ids);

    let (status, receipt) = call(
        &router,
        "POST",
        "/api/game/submit",
        Some("alice"),
        Some(json!({ "sessionId": session_id, "answers": answers(&question_ids, 8) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["completed"], false);
    assert_eq!(receipt["correctAnswers"], 8);
    assert_eq!(receipt["yourAnswered"], 10);

    let (_, receipt) = call(
        &router,
        "POST",
        "/api/game/submit",
        Some("bob"),
        Some(json!({ "sessionId": session_id, "answers": answers(&question_ids, 5) })),
    )
    .await;
    assert_eq!(receipt["completed"], true);

    // Step 4: explicit finalization applies each player's stats once
    let (status, report) = call(
        &router,
        "POST",
        "/api/game/update-player-stats",
        Some("alice"),
        Some(json!({ "sessionId": session_id, "outcome": "win" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["status"], "applied");
    assert_eq!(report["outcome"], "win");
    assert_eq!(report["statsFinalized"], false);

    // A dishonest claim does not change what is applied
    let (_, report) = call(
        &router,
        "POST",
        "/api/game/update-player-stats",
        Some("bob"),
        Some(json!({ "sessionId": session_id, "outcome": "win" })),
    )
    .await;
    assert_eq!(report["status"], "applied");
    assert_eq!(report["outcome"], "loss");
    assert_eq!(report["statsFinalized"], true);

    let (_, report) = call(
        &router,
        "POST",
        "/api/game/update-player-stats",
        Some("alice"),
        Some(json!({ "sessionId": session_id })),
    )
    .await;
    assert_eq!(report["status"], "already_applied");

    // Step 5: the result reflects the ledger
    let uri = format!("/api/game/result/{}", session_id);
    let (status, result) = call(&router, "GET", &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["status"], "completed");
    assert_eq!(result["statsFinalized"], true);
    assert_eq!(result["outcome"], "loss");
    assert_eq!(result["p1"]["id"], "alice");
    assert_eq!(result["p1"]["correct"], 8);
    assert_eq!(result["p2"]["correct"], 5);
    let your_answers = result["yourAnswers"].as_array().unwrap();
    assert_eq!(your_answers.len(), 10);
    assert_eq!(
        your_answers.iter().filter(|a| a["correct"] == true).count(),
        5
    );

    let alice = context
        .player_store()
        .find_by_id(&"alice".to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alice.experience, 40);
    assert_eq!(alice.win_streak, 1);
    assert_eq!(alice.stats.games_played, 1);
    assert_eq!(alice.stats.correct_answers, 8);

    let bob = context
        .player_store()
        .find_by_id(&"bob".to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bob.experience, 10);
    assert_eq!(bob.stats.wins, 0);
}

#[tokio::test]
async fn test_result_fetch_finalizes_in_background() {
    let context = test_context(seeded_bank(&[(1, 10)]), &["alice", "bob"]).await;
    let router = context.router();

    call(&router, "POST", "/api/match/join", Some("alice"), None).await;
    let (_, found) = call(&router, "POST", "/api/match/join", Some("bob"), None).await;
    let session_id = session_id_of(&found);
    let question_ids = question_ids_of(&found);

    for (player, correct) in [("alice", 6), ("bob", 6)] {
        call(
            &router,
            "POST",
            "/api/game/submit",
            Some(player),
            Some(json!({ "sessionId": session_id, "answers": answers(&question_ids, correct) })),
        )
        .await;
    }

    let uri = format!("/api/game/result/{}", session_id);
    let (_, result) = call(&router, "GET", &uri, Some("alice"), None).await;
    assert_eq!(result["outcome"], "draw");

    let mut finalized = false;
    for _ in 0..50 {
        let (_, result) = call(&router, "GET", &uri, Some("alice"), None).await;
        if result["statsFinalized"] == true {
            finalized = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(finalized);

    for player in ["alice", "bob"] {
        let record = context
            .player_store()
            .find_by_id(&player.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.experience, 20);
        assert_eq!(record.win_streak, 0);
    }
}

#[tokio::test]
async fn test_authentication_required() {
    let context = test_context(seeded_bank(&[(1, 10)]), &["alice"]).await;
    let router = context.router();

    let (status, body) = call(&router, "POST", "/api/match/join", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "not_authenticated");

    let (status, _) = call(&router, "POST", "/api/match/join", Some("mallory"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // First authenticated contact registers the player
    let (status, body) = call(&router, "GET", "/api/match/queue-status", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["level"], 1);
    assert_eq!(body["queued"], false);
}

#[tokio::test]
async fn test_session_membership_is_enforced() {
    let context = test_context(seeded_bank(&[(1, 10)]), &["alice", "bob", "carol"]).await;
    let router = context.router();

    call(&router, "POST", "/api/match/join", Some("alice"), None).await;
    let (_, found) = call(&router, "POST", "/api/match/join", Some("bob"), None).await;
    let session_id = session_id_of(&found);

    let uri = format!("/api/game/session/{}", session_id);
    let (status, body) = call(&router, "GET", &uri, Some("carol"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "not_a_participant");

    let (status, _) = call(
        &router,
        "POST",
        "/api/game/submit",
        Some("carol"),
        Some(json!({ "sessionId": session_id, "answers": answers(&question_ids_of(&found), 1) })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/api/game/result/{}", uuid::Uuid::new_v4());
    let (status, _) = call(&router, "GET", &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submission_rules() {
    let context = test_context(seeded_bank(&[(1, 10)]), &["alice", "bob"]).await;
    let router = context.router();

    call(&router, "POST", "/api/match/join", Some("alice"), None).await;
    let (_, found) = call(&router, "POST", "/api/match/join", Some("bob"), None).await;
    let session_id = session_id_of(&found);
    let question_ids = question_ids_of(&found);

    // Empty batch
    let (status, _) = call(
        &router,
        "POST",
        "/api/game/submit",
        Some("alice"),
        Some(json!({ "sessionId": session_id, "answers": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown questions are skipped, not fatal
    let mut batch = answers(&question_ids[..2], 2);
    batch.extend(answers(&[uuid::Uuid::new_v4()], 1));
    let (status, receipt) = call(
        &router,
        "POST",
        "/api/game/submit",
        Some("alice"),
        Some(json!({ "sessionId": session_id, "answers": batch })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["recorded"], 2);
    assert_eq!(receipt["skipped"], 1);

    // Resubmitting overwrites rather than double counting
    let (_, receipt) = call(
        &router,
        "POST",
        "/api/game/submit",
        Some("alice"),
        Some(json!({ "sessionId": session_id, "answers": answers(&question_ids, 0) })),
    )
    .await;
    assert_eq!(receipt["yourAnswered"], 10);
    assert_eq!(receipt["correctAnswers"], 0);

    call(
        &router,
        "POST",
        "/api/game/submit",
        Some("bob"),
        Some(json!({ "sessionId": session_id, "answers": answers(&question_ids, 3) })),
    )
    .await;

    // Completed sessions accept no more answers
    let (status, body) = call(
        &router,
        "POST",
        "/api/game/submit",
        Some("alice"),
        Some(json!({ "sessionId": session_id, "answers": answers(&question_ids, 10) })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "session_not_active");
}

#[tokio::test]
async fn test_question_shortage_keeps_waiter_queued() {
    let context = test_context(seeded_bank(&[(1, 4)]), &["alice", "bob"]).await;
    let router = context.router();

    call(&router, "POST", "/api/match/join", Some("alice"), None).await;
    let (status, body) = call(&router, "POST", "/api/match/join", Some("bob"), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "question_shortage");
    assert_eq!(body["retryable"], true);

    let (_, alice) = call(&router, "GET", "/api/match/queue-status", Some("alice"), None).await;
    assert_eq!(alice["queued"], true);
    assert_eq!(alice["position"], 0);

    let (_, bob) = call(&router, "GET", "/api/match/queue-status", Some("bob"), None).await;
    assert_eq!(bob["queued"], false);

    let stats = context.aggregator().get_stats().await.unwrap();
    assert_eq!(stats.total_sessions, 0);
}

#[tokio::test]
async fn test_leave_queue() {
    let context = test_context(seeded_bank(&[(1, 10)]), &["alice"]).await;
    let router = context.router();

    call(&router, "POST", "/api/match/join", Some("alice"), None).await;
    let (_, body) = call(&router, "POST", "/api/match/join", Some("alice"), None).await;
    assert_eq!(body["status"], "already_queued");

    let (status, body) = call(&router, "POST", "/api/match/leave", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["left"], true);

    let (_, body) = call(&router, "POST", "/api/match/leave", Some("alice"), None).await;
    assert_eq!(body["left"], false);
}

#[tokio::test]
async fn test_ops_routes_share_the_listener() {
    let context = test_context(seeded_bank(&[(1, 10)]), &["alice"]).await;
    let router = context.router();

    let (status, body) = call(&router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _) = call(&router, "GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&router, "GET", "/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["queue"]["waiting"], 0);
}

#[tokio::test]
async fn test_player_profile() {
    let context = test_context(seeded_bank(&[(1, 10)]), &["alice", "bob"]).await;
    let router = context.router();

    // First contact registers the player
    let (status, profile) = call(&router, "GET", "/api/player/me", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["id"], "alice");
    assert_eq!(profile["level"], 1);
    assert_eq!(profile["experience"], 0);
    assert_eq!(profile["xpToNextLevel"], 200);
    assert_eq!(profile["stats"]["gamesPlayed"], 0);
    assert!(profile.get("version").is_none());

    call(&router, "POST", "/api/match/join", Some("alice"), None).await;
    let (_, found) = call(&router, "POST", "/api/match/join", Some("bob"), None).await;
    let session_id = session_id_of(&found);
    let question_ids = question_ids_of(&found);
    for (player, correct) in [("alice", 9), ("bob", 2)] {
        call(
            &router,
            "POST",
            "/api/game/submit",
            Some(player),
            Some(json!({ "sessionId": session_id, "answers": answers(&question_ids, correct) })),
        )
        .await;
    }
    call(
        &router,
        "POST",
        "/api/game/update-player-stats",
        Some("alice"),
        Some(json!({ "sessionId": session_id })),
    )
    .await;

    let (_, profile) = call(&router, "GET", "/api/player/me", Some("alice"), None).await;
    assert_eq!(profile["experience"], 40);
    assert_eq!(profile["xpToNextLevel"], 160);
    assert_eq!(profile["winStreak"], 1);
    assert_eq!(profile["stats"]["wins"], 1);
    assert_eq!(profile["stats"]["correctAnswers"], 9);

    let (status, _) = call(&router, "GET", "/api/player/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
