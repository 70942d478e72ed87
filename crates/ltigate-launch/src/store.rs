//! Session storage.
//!
//! Provides the [`SessionStore`] seam and [`InMemorySessionStore`], a
//! `DashMap`-backed store. A new launch on a reused session id replaces the
//! previous record in one step; readers see either the old session or the new
//! one, never a cleared record.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ltigate_core::SessionId;
use tracing::debug;

use crate::session::LaunchSession;

/// Errors reported by a session store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value storage for launch sessions, keyed by transport session id.
///
/// Implementations must tolerate concurrent calls for different ids.
pub trait SessionStore: Send + Sync {
    /// Store `session` under `id`, atomically replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write did not happen; the previous record
    /// (if any) must then still be intact.
    fn replace(&self, id: &SessionId, session: LaunchSession) -> Result<(), StoreError>;

    /// Fetch the session stored under `id`, unless it has expired by `now`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot be read.
    fn get(&self, id: &SessionId, now: DateTime<Utc>) -> Result<Option<LaunchSession>, StoreError>;

    /// Remove and return the session stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot be written.
    fn remove(&self, id: &SessionId) -> Result<Option<LaunchSession>, StoreError>;
}

/// Thread-safe in-memory session store.
///
/// # Examples
///
/// ```
/// use ltigate_core::SessionId;
/// use ltigate_launch::{InMemorySessionStore, SessionStore};
///
/// let store = InMemorySessionStore::new();
/// let id = SessionId::generate();
/// assert!(store.get(&id, chrono::Utc::now()).unwrap().is_none());
/// assert!(store.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    inner: DashMap<SessionId, LaunchSession>,
}

impl InMemorySessionStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Drop every session expired by `now`, returning how many were dropped.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.inner.len();
        self.inner.retain(|_, session| !session.is_expired_at(now));
        before.saturating_sub(self.inner.len())
    }

    /// Number of stored sessions, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn replace(&self, id: &SessionId, session: LaunchSession) -> Result<(), StoreError> {
        if self.inner.insert(id.clone(), session).is_some() {
            debug!(session_id = %id, "replaced previous launch session");
        }
        Ok(())
    }

    fn get(&self, id: &SessionId, now: DateTime<Utc>) -> Result<Option<LaunchSession>, StoreError> {
        if self
            .inner
            .remove_if(id, |_, session| session.is_expired_at(now))
            .is_some()
        {
            debug!(session_id = %id, "evicted expired launch session");
            return Ok(None);
        }
        Ok(self.inner.get(id).map(|entry| entry.value().clone()))
    }

    fn remove(&self, id: &SessionId) -> Result<Option<LaunchSession>, StoreError> {
        Ok(self.inner.remove(id).map(|(_, session)| session))
    }
}
