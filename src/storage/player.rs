//! Player store interface and implementations
//!
//! The store is a narrow interface over durable player records. Writes are
//! guarded by an optimistic `version` token so that concurrent finalizations
//! and level refreshes never overwrite each other.

use crate::error::{Result, TriviaError};
use crate::types::{Player, PlayerId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};

/// Trait for player persistence
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Get a player by ID
    async fn find_by_id(&self, player_id: &PlayerId) -> Result<Option<Player>>;

    /// Insert a new player. Returns false if the ID is already taken.
    async fn insert(&self, player: Player) -> Result<bool>;

    /// Persist a player whose `version` matches the stored one.
    ///
    /// Returns the stored record with its bumped version, or
    /// `TriviaError::VersionConflict` when another writer got there first.
    async fn save(&self, player: Player) -> Result<Player>;

    /// Total number of players
    async fn count(&self) -> Result<usize>;
}

/// Load-modify-save with optimistic retry.
///
/// `apply` returns `None` when the record needs no write; the freshly loaded
/// player is then returned unchanged.
pub async fn update_player<F, R>(
    store: &dyn PlayerStore,
    player_id: &PlayerId,
    max_retries: u32,
    mut apply: F,
) -> Result<(Player, Option<R>)>
where
    F: FnMut(&mut Player) -> Option<R> + Send,
    R: Send,
{
    let mut attempt = 0;
    loop {
        let mut player =
            store
                .find_by_id(player_id)
                .await?
                .ok_or_else(|| TriviaError::PlayerNotFound {
                    player_id: player_id.clone(),
                })?;

        let Some(result) = apply(&mut player) else {
            return Ok((player, None));
        };

        match store.save(player).await {
            Ok(saved) => return Ok((saved, Some(result))),
            Err(e)
                if attempt < max_retries
                    && matches!(
                        e.downcast_ref::<TriviaError>(),
                        Some(TriviaError::VersionConflict { .. })
                    ) =>
            {
                attempt += 1;
                debug!(
                    "Version conflict saving player '{}', retrying ({}/{})",
                    player_id, attempt, max_retries
                );
            }
            Err(e) => {
                warn!("Failed to save player '{}': {}", player_id, e);
                return Err(e);
            }
        }
    }
}

/// In-memory player store
#[derive(Debug, Default)]
pub struct InMemoryPlayerStore {
    players: RwLock<HashMap<PlayerId, Player>>,
}

impl InMemoryPlayerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlayerStore for InMemoryPlayerStore {
    async fn find_by_id(&self, player_id: &PlayerId) -> Result<Option<Player>> {
        let players = self
            .players
            .read()
            .map_err(|_| TriviaError::InternalError {
                message: "Failed to acquire players read lock".to_string(),
            })?;

        Ok(players.get(player_id).cloned())
    }

    async fn insert(&self, player: Player) -> Result<bool> {
        let mut players = self
            .players
            .write()
            .map_err(|_| TriviaError::InternalError {
                message: "Failed to acquire players write lock".to_string(),
            })?;

        if players.contains_key(&player.id) {
            return Ok(false);
        }
        players.insert(player.id.clone(), player);
        Ok(true)
    }

    async fn save(&self, mut player: Player) -> Result<Player> {
        let mut players = self
            .players
            .write()
            .map_err(|_| TriviaError::InternalError {
                message: "Failed to acquire players write lock".to_string(),
            })?;

        let stored = players
            .get(&player.id)
            .ok_or_else(|| TriviaError::PlayerNotFound {
                player_id: player.id.clone(),
            })?;

        if stored.version != player.version {
            return Err(TriviaError::VersionConflict {
                player_id: player.id.clone(),
                expected: player.version,
                found: stored.version,
            }
            .into());
        }

        player.version += 1;
        players.insert(player.id.clone(), player.clone());
        Ok(player)
    }

    async fn count(&self) -> Result<usize> {
        let players = self
            .players
            .read()
            .map_err(|_| TriviaError::InternalError {
                message: "Failed to acquire players read lock".to_string(),
            })?;

        Ok(players.len())
    }
}
