//! Duel Simulator CLI Tool
//!
//! Drives the matchmaking and scoring core in-process with simulated players.
//!
//! Usage:
//!   cargo run --bin duel-simulator -- --help
//!   cargo run --bin duel-simulator -- --players 20 --rounds 3
//!   cargo run --bin duel-simulator -- --question-bank data/questions.json --accuracy 0.8

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use tracing::{info, warn};
use trivia_duel::config::AppConfig;
use trivia_duel::gateway::StaticTokenAuthenticator;
use trivia_duel::metrics::MetricsCollector;
use trivia_duel::queue::JoinOutcome;
use trivia_duel::service::ServiceContext;
use trivia_duel::session::FinalizationPath;
use trivia_duel::storage::{InMemoryQuestionBank, QuestionBank};
use trivia_duel::types::{AnswerSubmission, Player, PublicQuestion, Question, SessionId};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "duel-simulator")]
#[command(about = "Simulate trivia duels against the in-process matchmaking core")]
struct Cli {
    /// Number of simulated players (rounded down to an even number)
    #[arg(short, long, default_value = "10")]
    players: usize,

    /// Number of matchmaking rounds to play
    #[arg(short, long, default_value = "1")]
    rounds: usize,

    /// Probability that a simulated answer is correct
    #[arg(short, long, default_value = "0.6")]
    accuracy: f64,

    /// Question bank seed file; a synthetic bank is generated when absent
    #[arg(short, long, value_name = "FILE")]
    question_bank: Option<PathBuf>,

    /// Levels covered by the synthetic bank
    #[arg(long, default_value = "5")]
    levels: u32,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Bank with `QUESTIONS_PER_SESSION * 2` questions on every level
fn synthetic_bank(levels: u32) -> Result<InMemoryQuestionBank> {
    let bank = InMemoryQuestionBank::new();
    for level in 1..=levels {
        for n in 0..trivia_duel::QUESTIONS_PER_SESSION * 2 {
            bank.insert(Question {
                id: Uuid::new_v4(),
                level,
                text: format!("Level {} question {}", level, n + 1),
                options: (0..4).map(|o| format!("Option {}", o)).collect(),
                correct_answer: format!("Option {}", n % 4),
            })?;
        }
    }
    Ok(bank)
}

/// Answer every question, correctly with probability `accuracy`
async fn simulated_answers(
    questions: &[PublicQuestion],
    bank: &InMemoryQuestionBank,
    accuracy: f64,
) -> Result<Vec<AnswerSubmission>> {
    let ids: Vec<_> = questions.iter().map(|q| q.id).collect();
    let correct: Vec<String> = bank
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|q| q.correct_answer)
        .collect();

    let mut rng = rand::thread_rng();
    Ok(questions
        .iter()
        .zip(correct)
        .map(|(question, correct_answer)| {
            let selected_answer = if rng.gen_bool(accuracy) {
                correct_answer
            } else {
                question
                    .options
                    .iter()
                    .find(|option| **option != correct_answer)
                    .cloned()
                    .unwrap_or_default()
            };
            AnswerSubmission {
                question_id: question.id,
                selected_index: question.options.iter().position(|o| *o == selected_answer),
                selected_answer,
                response_ms: rng.gen_range(800..9_000),
            }
        })
        .collect())
}

async fn play_round(
    context: &ServiceContext,
    bank: &InMemoryQuestionBank,
    players: &[String],
    accuracy: f64,
) -> Result<Vec<SessionId>> {
    let matchmaker = context.matchmaker();
    let aggregator = context.aggregator();
    let mut sessions: Vec<(SessionId, [String; 2])> = Vec::new();

    for player_id in players {
        match matchmaker.join(player_id, None).await? {
            JoinOutcome::Queued { level, position } => {
                info!("{} queued at level {} (position {})", player_id, level, position)
            }
            JoinOutcome::AlreadyQueued { level, .. } => {
                warn!("{} was already queued at level {}", player_id, level)
            }
            JoinOutcome::Matching { level } => {
                warn!("{} is still being paired at level {}", player_id, level)
            }
            JoinOutcome::Matched(found) => {
                info!(
                    "{} matched with {} - session {}",
                    player_id, found.players.opponent.id, found.session_id
                );
                sessions.push((
                    found.session_id,
                    [found.players.opponent.id.clone(), player_id.clone()],
                ));
            }
        }
    }

    for (session_id, seats) in &sessions {
        // The waiter collects their match the way a polling client would
        let status = matchmaker.queue_status(&seats[0]).await?;
        if status.matched.map(|m| m.session_id) != Some(*session_id) {
            warn!("{} did not see session {} in queue status", seats[0], session_id);
        }

        for player_id in seats {
            let view = aggregator.session_view(player_id, session_id).await?;
            let answers = simulated_answers(&view.questions, bank, accuracy).await?;
            aggregator
                .submit_answers(player_id, session_id, answers)
                .await?;
        }

        aggregator
            .finalize(session_id, FinalizationPath::Explicit)
            .await?;
        let result = aggregator
            .get_result(&seats[0], session_id)
            .await?;
        println!(
            "  {} {}/{} vs {} {}/{} -> {}",
            result.p1.player.username,
            result.p1.correct,
            result.total_questions,
            result.p2.player.username,
            result.p2.correct,
            result.total_questions,
            result
                .outcome
                .map(|o| format!("{} for {}", o, result.p1.player.username))
                .unwrap_or_else(|| "pending".to_string())
        );
    }

    // Odd players out at a level wait for the next round's joins
    Ok(sessions.into_iter().map(|(session_id, _)| session_id).collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.as_str().into()),
        )
        .with_target(false)
        .init();

    let bank = match &cli.question_bank {
        Some(path) => InMemoryQuestionBank::from_seed_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => synthetic_bank(cli.levels)?,
    };
    let bank = Arc::new(bank);

    let context = ServiceContext::with_components(
        AppConfig::default(),
        bank.clone(),
        Arc::new(StaticTokenAuthenticator::new()),
        Arc::new(MetricsCollector::default()),
    );

    let count = cli.players - cli.players % 2;
    let players: Vec<String> = (1..=count).map(|n| format!("sim-{:03}", n)).collect();
    for player_id in &players {
        context
            .player_store()
            .insert(Player::new(player_id.clone(), player_id.clone()))
            .await?;
    }

    println!("🎲 Simulating {} rounds with {} players", cli.rounds, count);
    for round in 1..=cli.rounds {
        println!("Round {}:", round);
        let sessions = play_round(&context, &bank, &players, cli.accuracy).await?;
        println!("  {} sessions played", sessions.len());
    }

    println!();
    println!("📊 Final standings:");
    let mut standings = Vec::new();
    for player_id in &players {
        if let Some(player) = context.player_store().find_by_id(player_id).await? {
            standings.push(player);
        }
    }
    standings.sort_by(|a, b| b.experience.cmp(&a.experience));
    for player in standings {
        println!(
            "  {:<8} level {:>2}  xp {:>5}  wins {:>3}/{:<3} streak {}",
            player.username,
            player.level,
            player.experience,
            player.stats.wins,
            player.stats.games_played,
            player.win_streak
        );
    }

    let matchmaker = context.matchmaker().get_stats()?;
    let sessions = context.aggregator().get_stats().await?;
    println!();
    println!(
        "Pairings: {}, shortages: {}, still waiting: {}",
        matchmaker.pairings, matchmaker.question_shortages, matchmaker.players_waiting
    );
    println!(
        "Sessions: {} completed, {} finalized, {} answers recorded",
        sessions.completed_sessions, sessions.finalized_sessions, sessions.answers_recorded
    );

    Ok(())
}
