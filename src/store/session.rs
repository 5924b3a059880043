//! Session manager: opaque session ids to isolated stores, with TTL eviction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::info;

use crate::observability::Event;

use super::artifact_store::ArtifactStore;
use super::errors::{StoreError, StoreResult};

/// Default idle time after which a session is evicted (2 hours).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(7200);

/// Maps session ids to per-session stores.
///
/// The map has its own lock, distinct from every store's lock, so a slow
/// operation inside one session never blocks creation or eviction of
/// another. Expired sessions are evicted opportunistically on every
/// [`get_or_create`](SessionManager::get_or_create). A store that is still
/// referenced by an in-flight request is never evicted, regardless of age.
pub struct SessionManager {
    sessions: Mutex<HashMap<String, Arc<ArtifactStore>>>,
    ttl: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, Arc<ArtifactStore>>>> {
        self.sessions.lock().map_err(|_| StoreError::lock_poisoned())
    }

    /// Returns the session's store, creating a freshly seeded one if absent.
    pub fn get_or_create(&self, session_id: &str) -> StoreResult<Arc<ArtifactStore>> {
        let mut sessions = self.lock()?;
        self.evict_locked(&mut sessions, Instant::now());

        if let Some(store) = sessions.get(session_id) {
            store.touch();
            return Ok(Arc::clone(store));
        }

        let store = Arc::new(ArtifactStore::new());
        sessions.insert(session_id.to_string(), Arc::clone(&store));
        info!(
            event = %Event::SessionCreated,
            session = session_id,
            active_sessions = sessions.len(),
            "session created"
        );
        Ok(store)
    }

    /// Evicts expired sessions now. Returns the evicted ids.
    pub fn evict_expired(&self) -> StoreResult<Vec<String>> {
        let mut sessions = self.lock()?;
        Ok(self.evict_locked(&mut sessions, Instant::now()))
    }

    /// Ids of live sessions, sorted. Expired sessions are evicted first.
    pub fn session_ids(&self) -> StoreResult<Vec<String>> {
        let mut sessions = self.lock()?;
        self.evict_locked(&mut sessions, Instant::now());
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    pub fn active_session_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.len())
    }

    fn evict_locked(
        &self,
        sessions: &mut HashMap<String, Arc<ArtifactStore>>,
        now: Instant,
    ) -> Vec<String> {
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, store)| {
                // The map's own reference is the only one for idle stores.
                Arc::strong_count(store) == 1
                    && now.saturating_duration_since(store.last_accessed()) > self.ttl
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            sessions.remove(id);
            info!(event = %Event::SessionEvicted, session = %id, "session expired");
        }
        expired
    }
}
