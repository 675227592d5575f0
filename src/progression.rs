//! Level and experience progression
//!
//! Levels are derived from experience, never stored authoritatively. XP is
//! awarded once per player per completed session.

use crate::types::{AnswerCounts, Outcome, Player, PlayerProfile};
use crate::utils::weighted_mean;

/// Experience needed per level step
pub const XP_PER_LEVEL: u64 = 200;

pub const WIN_XP: u64 = 40;
pub const WIN_STREAK_BONUS_XP: u64 = 10;
/// Streak (before the current win) at which the bonus applies
pub const WIN_STREAK_BONUS_THRESHOLD: u32 = 3;
pub const DRAW_XP: u64 = 20;
pub const LOSS_XP: u64 = 10;

/// Level for an experience total
pub fn compute_level(experience: u64) -> u32 {
    let level = experience / XP_PER_LEVEL + 1;
    u32::try_from(level).unwrap_or(u32::MAX)
}

/// Refresh the cached level. Returns true when it changed.
pub fn refresh_level(player: &mut Player) -> bool {
    let level = compute_level(player.experience);
    if player.level != level {
        player.level = level;
        true
    } else {
        false
    }
}

/// Profile with the level derived from experience, whatever is cached
pub fn profile(player: &Player) -> PlayerProfile {
    PlayerProfile {
        id: player.id.clone(),
        username: player.username.clone(),
        level: compute_level(player.experience),
        experience: player.experience,
        xp_to_next_level: XP_PER_LEVEL - player.experience % XP_PER_LEVEL,
        win_streak: player.win_streak,
        stats: player.stats.clone(),
        created_at: player.created_at,
    }
}

/// Apply XP and streak changes for an outcome, returning the XP awarded
pub fn award_xp(player: &mut Player, outcome: Outcome) -> u64 {
    let xp = match outcome {
        Outcome::Win => {
            let bonus = if player.win_streak >= WIN_STREAK_BONUS_THRESHOLD {
                WIN_STREAK_BONUS_XP
            } else {
                0
            };
            player.win_streak = player.win_streak.saturating_add(1);
            WIN_XP + bonus
        }
        Outcome::Draw => DRAW_XP,
        Outcome::Loss => {
            player.win_streak = 0;
            LOSS_XP
        }
    };

    player.experience = player.experience.saturating_add(xp);
    refresh_level(player);
    xp
}

/// Fold one finished session into the player's record, returning the XP awarded
pub fn apply_session_result(player: &mut Player, outcome: Outcome, counts: &AnswerCounts) -> u64 {
    let stats = &mut player.stats;
    stats.avg_response_ms = weighted_mean(
        stats.avg_response_ms,
        stats.total_answers,
        counts.avg_response_ms,
        u64::from(counts.total),
    );
    stats.games_played += 1;
    if outcome == Outcome::Win {
        stats.wins += 1;
    }
    stats.correct_answers += u64::from(counts.correct);
    stats.total_answers += u64::from(counts.total);

    award_xp(player, outcome)
}
