use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::{Result, WizardError},
    models::WizardFormData,
};

/// Prefix of every snapshot key; the session id is appended.
pub const SNAPSHOT_KEY_PREFIX: &str = "recipe-wizard-form-data";

/// Key/value store holding one serialized `WizardFormData` per key.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    async fn save(&self, key: &str, snapshot: &WizardFormData) -> Result<()>;
    async fn load(&self, key: &str) -> Result<Option<WizardFormData>>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory implementation of SnapshotStorage.
///
/// Values are stored as JSON so that the same serialization path is exercised
/// as with the database backend.
pub struct InMemorySnapshotStorage {
    snapshots: Arc<DashMap<String, serde_json::Value>>,
}

impl InMemorySnapshotStorage {
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(DashMap::new()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.snapshots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl Default for InMemorySnapshotStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStorage for InMemorySnapshotStorage {
    async fn save(&self, key: &str, snapshot: &WizardFormData) -> Result<()> {
        let value = serde_json::to_value(snapshot)?;
        self.snapshots.insert(key.to_string(), value);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<WizardFormData>> {
        match self.snapshots.get(key) {
            Some(entry) => Ok(Some(serde_json::from_value(entry.value().clone())?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.snapshots.remove(key);
        Ok(())
    }
}

/// Binds a storage backend to the snapshot key of one wizard session.
///
/// Every operation returns an explicit result; the wizard decides how to
/// degrade when persistence is unavailable.
#[derive(Clone)]
pub struct SessionPersistence {
    storage: Arc<dyn SnapshotStorage>,
    key: String,
}

impl SessionPersistence {
    pub fn new(storage: Arc<dyn SnapshotStorage>, session_id: &str) -> Self {
        Self {
            storage,
            key: format!("{SNAPSHOT_KEY_PREFIX}:{session_id}"),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn read(&self) -> Result<Option<WizardFormData>> {
        self.storage
            .load(&self.key)
            .await
            .map_err(|e| WizardError::Persistence(e.to_string()))
    }

    pub async fn write(&self, form: &WizardFormData) -> Result<()> {
        debug!(key = %self.key, "Writing wizard snapshot");
        self.storage
            .save(&self.key, form)
            .await
            .map_err(|e| WizardError::Persistence(e.to_string()))
    }

    pub async fn clear(&self) -> Result<()> {
        debug!(key = %self.key, "Removing wizard snapshot");
        self.storage
            .remove(&self.key)
            .await
            .map_err(|e| WizardError::Persistence(e.to_string()))
    }
}
