//! Per-level FIFO registry of waiting players
//!
//! All operations run under one synchronous mutex that is never held across
//! an `.await`, so pop-or-push is atomic with respect to every other join.
//!
//! Both players of a pairing stay marked as in flight until the session
//! exists and the waiter has been told, so a repeat join in that window can
//! neither queue them again nor seat them twice.

use crate::error::{Result, TriviaError};
use crate::types::{ConnectionId, PlayerId};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// A waiting player
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub player_id: PlayerId,
    /// Push connection to notify on pairing, if any
    pub connection: Option<ConnectionId>,
    pub joined_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(player_id: impl Into<PlayerId>, connection: Option<ConnectionId>) -> Self {
        Self {
            player_id: player_id.into(),
            connection,
            joined_at: current_timestamp(),
        }
    }
}

/// What `join_or_pair` did
#[derive(Debug, Clone, PartialEq)]
pub enum QueueDecision {
    /// Appended at `position` (0-based)
    Queued { position: usize },
    /// Already waiting at this level; nothing changed
    AlreadyQueued { position: usize },
    /// Popped the head of the level queue
    Paired { opponent: QueueEntry },
    /// The player is part of a pairing still being set up; nothing changed
    Pairing,
}

#[derive(Debug, Default)]
struct QueueState {
    queues: HashMap<u32, VecDeque<QueueEntry>>,
    /// Level each waiting player is queued at
    index: HashMap<PlayerId, u32>,
    /// Players of pairings whose session is still being created
    pairing: HashSet<PlayerId>,
}

impl QueueState {
    fn remove(&mut self, player_id: &PlayerId) -> Option<(u32, QueueEntry)> {
        let level = self.index.remove(player_id)?;
        let queue = self.queues.get_mut(&level)?;
        let at = queue.iter().position(|e| &e.player_id == player_id)?;
        let entry = queue.remove(at)?;
        if queue.is_empty() {
            self.queues.remove(&level);
        }
        Some((level, entry))
    }

    fn position(&self, player_id: &PlayerId) -> Option<(u32, usize)> {
        let level = *self.index.get(player_id)?;
        let at = self
            .queues
            .get(&level)?
            .iter()
            .position(|e| &e.player_id == player_id)?;
        Some((level, at))
    }
}

/// Registry of waiting players, one FIFO per level
#[derive(Debug, Default)]
pub struct MatchQueue {
    state: Mutex<QueueState>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>> {
        self.state.lock().map_err(|_| {
            TriviaError::InternalError {
                message: "Failed to acquire match queue lock".to_string(),
            }
            .into()
        })
    }

    /// Pair the entry with the head of its level queue, or enqueue it.
    ///
    /// A player already waiting at `level` stays put (their push connection
    /// is refreshed). A player waiting at another level is moved first.
    pub fn join_or_pair(&self, level: u32, entry: QueueEntry) -> Result<QueueDecision> {
        let mut state = self.lock()?;

        if state.pairing.contains(&entry.player_id) {
            return Ok(QueueDecision::Pairing);
        }

        if let Some((queued_level, position)) = state.position(&entry.player_id) {
            if queued_level == level {
                if entry.connection.is_some() {
                    if let Some(existing) = state
                        .queues
                        .get_mut(&level)
                        .and_then(|q| q.get_mut(position))
                    {
                        existing.connection = entry.connection;
                    }
                }
                return Ok(QueueDecision::AlreadyQueued { position });
            }

            debug!(
                "Moving player '{}' from level {} to level {}",
                entry.player_id, queued_level, level
            );
            state.remove(&entry.player_id);
        }

        if let Some(opponent) = state.queues.get_mut(&level).and_then(VecDeque::pop_front) {
            state.index.remove(&opponent.player_id);
            if state.queues.get(&level).is_some_and(VecDeque::is_empty) {
                state.queues.remove(&level);
            }
            state.pairing.insert(opponent.player_id.clone());
            state.pairing.insert(entry.player_id);
            return Ok(QueueDecision::Paired { opponent });
        }

        state.index.insert(entry.player_id.clone(), level);
        let queue = state.queues.entry(level).or_default();
        queue.push_back(entry);
        Ok(QueueDecision::Queued {
            position: queue.len() - 1,
        })
    }

    /// Clear the in-flight marks of a pairing.
    ///
    /// With `restore` the popped waiter goes back to the head of its queue;
    /// returns whether that happened (false if they queued again meanwhile).
    pub fn end_pairing(
        &self,
        level: u32,
        waiter: &QueueEntry,
        joiner: &PlayerId,
        restore: bool,
    ) -> Result<bool> {
        let mut state = self.lock()?;
        state.pairing.remove(&waiter.player_id);
        state.pairing.remove(joiner);

        if !restore || state.index.contains_key(&waiter.player_id) {
            return Ok(false);
        }

        state.index.insert(waiter.player_id.clone(), level);
        state
            .queues
            .entry(level)
            .or_default()
            .push_front(waiter.clone());
        Ok(true)
    }

    /// Whether the player belongs to a pairing still being set up
    pub fn is_pairing(&self, player_id: &PlayerId) -> Result<bool> {
        Ok(self.lock()?.pairing.contains(player_id))
    }

    /// Remove a player from whichever level holds them
    pub fn leave(&self, player_id: &PlayerId) -> Result<Option<QueueEntry>> {
        let mut state = self.lock()?;
        Ok(state.remove(player_id).map(|(_, entry)| entry))
    }

    /// Remove a player only if they are waiting on `connection`
    pub fn leave_connection(
        &self,
        player_id: &PlayerId,
        connection: ConnectionId,
    ) -> Result<Option<QueueEntry>> {
        let mut state = self.lock()?;
        let owned = state
            .position(player_id)
            .and_then(|(level, at)| state.queues.get(&level)?.get(at))
            .is_some_and(|e| e.connection == Some(connection));

        if !owned {
            return Ok(None);
        }
        Ok(state.remove(player_id).map(|(_, entry)| entry))
    }

    /// Level and 0-based position of a waiting player
    pub fn position(&self, player_id: &PlayerId) -> Result<Option<(u32, usize)>> {
        Ok(self.lock()?.position(player_id))
    }

    /// Waiting players per level
    pub fn level_sizes(&self) -> Result<BTreeMap<u32, usize>> {
        let state = self.lock()?;
        Ok(state
            .queues
            .iter()
            .map(|(level, queue)| (*level, queue.len()))
            .collect())
    }

    /// Total waiting players
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.index.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Players of pairings in flight
    pub fn pairing_len(&self) -> usize {
        self.state.lock().map(|s| s.pairing.len()).unwrap_or(0)
    }
}

/// Scope of one in-flight pairing.
///
/// Dropping the guard before `seated` (an error or a cancelled join) puts
/// the waiter back at the head of their queue. Dropping it at any point
/// clears both players' in-flight marks.
pub struct PairingGuard {
    queue: Arc<MatchQueue>,
    level: u32,
    waiter: QueueEntry,
    joiner: PlayerId,
    restore_waiter: bool,
    ended: bool,
}

impl PairingGuard {
    pub fn new(queue: Arc<MatchQueue>, level: u32, waiter: QueueEntry, joiner: PlayerId) -> Self {
        Self {
            queue,
            level,
            waiter,
            joiner,
            restore_waiter: true,
            ended: false,
        }
    }

    pub fn waiter(&self) -> &QueueEntry {
        &self.waiter
    }

    /// The session exists; the waiter must not return to the queue
    pub fn seated(&mut self) {
        self.restore_waiter = false;
    }

    /// End the pairing now. Returns whether the waiter was restored.
    pub fn end(mut self) -> Result<bool> {
        self.ended = true;
        self.queue
            .end_pairing(self.level, &self.waiter, &self.joiner, self.restore_waiter)
    }
}

impl Drop for PairingGuard {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        match self
            .queue
            .end_pairing(self.level, &self.waiter, &self.joiner, self.restore_waiter)
        {
            Ok(true) => debug!(
                "Pairing at level {} dropped, player '{}' restored to queue head",
                self.level, self.waiter.player_id
            ),
            Ok(false) => {}
            Err(e) => warn!(
                "Failed to clear pairing of '{}' and '{}': {}",
                self.waiter.player_id, self.joiner, e
            ),
        }
    }
}
