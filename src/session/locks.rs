//! Per-session serialization
//!
//! Every read-then-transition on a session runs while holding that session's
//! async mutex. Unrelated sessions never contend.
//!
//! The registry only keeps weak handles: a lock lives exactly as long as some
//! caller holds or waits on it, and dead entries are pruned whenever a new
//! one is created.

use crate::error::{Result, TriviaError};
use crate::types::SessionId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

type SessionLock = tokio::sync::Mutex<()>;

/// Registry of per-session async locks
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<SessionId, Weak<SessionLock>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the lock for a session, creating it if no caller holds one
    pub fn lock_for(&self, session_id: &SessionId) -> Result<Arc<SessionLock>> {
        let mut locks = self.locks.lock().map_err(|_| TriviaError::InternalError {
            message: "Failed to acquire session lock registry".to_string(),
        })?;

        if let Some(lock) = locks.get(session_id).and_then(Weak::upgrade) {
            return Ok(lock);
        }

        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(SessionLock::new(()));
        locks.insert(*session_id, Arc::downgrade(&lock));
        Ok(lock)
    }

    /// Number of locks some caller still holds
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .map(|locks| locks.values().filter(|lock| lock.strong_count() > 0).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
