//! Live wizard sessions.
//!
//! Opening a session for the first time restores its snapshot; later opens
//! hand out the same live wizard. Closing drops the live handle but keeps the
//! snapshot, so the next open behaves like a page reload. Sessions nobody
//! touched for a while are evicted the same way.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::{
    error::Result,
    storage::{SessionPersistence, SnapshotStorage},
    wizard::Wizard,
};

struct LiveSession {
    wizard: Wizard,
    last_seen: Instant,
}

impl LiveSession {
    fn new(wizard: Wizard) -> Self {
        Self {
            wizard,
            last_seen: Instant::now(),
        }
    }

    fn touch(&mut self) -> Wizard {
        self.last_seen = Instant::now();
        self.wizard.clone()
    }
}

#[derive(Clone)]
pub struct WizardSessions {
    storage: Arc<dyn SnapshotStorage>,
    live: Arc<DashMap<String, LiveSession>>,
}

impl WizardSessions {
    pub fn new(storage: Arc<dyn SnapshotStorage>) -> Self {
        Self {
            storage,
            live: Arc::new(DashMap::new()),
        }
    }

    fn persistence(&self, session_id: &str) -> SessionPersistence {
        SessionPersistence::new(self.storage.clone(), session_id)
    }

    /// Open a session, starting a fresh wizard if it has no snapshot.
    pub async fn open(&self, session_id: &str) -> Wizard {
        if let Some(wizard) = self.get(session_id) {
            return wizard;
        }

        let wizard = Wizard::initialize(self.persistence(session_id)).await;
        info!(session_id = %session_id, "Wizard session opened");
        self.insert(session_id, wizard)
    }

    /// Open a session that is either live or has a snapshot to restore.
    ///
    /// Unknown sessions yield `None` and leave nothing behind.
    pub async fn resume(&self, session_id: &str) -> Result<Option<Wizard>> {
        if let Some(wizard) = self.get(session_id) {
            return Ok(Some(wizard));
        }

        match Wizard::restore(self.persistence(session_id)).await? {
            Some(wizard) => {
                info!(session_id = %session_id, "Wizard session resumed");
                Ok(Some(self.insert(session_id, wizard)))
            }
            None => {
                debug!(session_id = %session_id, "No live wizard or snapshot for session");
                Ok(None)
            }
        }
    }

    fn insert(&self, session_id: &str, wizard: Wizard) -> Wizard {
        // A concurrent open may have won the race; keep the first one.
        self.live
            .entry(session_id.to_string())
            .or_insert_with(|| LiveSession::new(wizard))
            .touch()
    }

    pub fn get(&self, session_id: &str) -> Option<Wizard> {
        self.live.get_mut(session_id).map(|mut entry| entry.touch())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.live.contains_key(session_id)
    }

    pub fn close(&self, session_id: &str) -> bool {
        self.live.remove(session_id).is_some()
    }

    /// Drop live sessions idle for at least `max_idle`. Snapshots are kept.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let before = self.live.len();
        self.live
            .retain(|_, session| session.last_seen.elapsed() < max_idle);
        let evicted = before.saturating_sub(self.live.len());
        if evicted > 0 {
            info!(evicted, remaining = self.live.len(), "Evicted idle wizard sessions");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
