//! Memory-based field hash implementation

use super::FieldTtlHash;
use crate::cache::{CacheError, CacheResult, SharedMemoryStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Clone, Debug)]
struct FieldEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl FieldEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// Fields of one hash stored in the shared memory store
#[derive(Clone, Debug, Default)]
pub struct HashEntry {
    fields: HashMap<String, FieldEntry>,
}

impl HashEntry {
    /// Drop a field if its deadline has passed, returning the live entry
    fn live_field(&mut self, field: &str, now: DateTime<Utc>) -> Option<&mut FieldEntry> {
        if self.fields.get(field).is_some_and(|f| f.is_expired(now)) {
            self.fields.remove(field);
        }
        self.fields.get_mut(field)
    }

    /// Drop every field whose deadline has passed
    fn sweep(&mut self, now: DateTime<Utc>) {
        self.fields.retain(|_, f| !f.is_expired(now));
    }
}

fn deadline(now: DateTime<Utc>, ttl: Duration) -> CacheResult<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| CacheError::Cache(format!("Invalid TTL: {:?}", ttl)))
}

/// Memory-based field hash, shares state with every handle on the same store
#[derive(Clone)]
pub struct MemoryFieldHash {
    key: String,
    store: SharedMemoryStore,
}

impl MemoryFieldHash {
    /// Create an isolated hash (not visible to other handles)
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            store: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a hash backed by a shared store
    pub fn from_shared_store(store: SharedMemoryStore, key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            store,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl FieldTtlHash for MemoryFieldHash {
    async fn set_with_ttl(&self, field: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let now = Utc::now();
        let expires_at = deadline(now, ttl)?;
        let mut store = self.store.write().await;
        let entry = store.entry(self.key.clone()).or_default();
        entry.sweep(now);
        entry.fields.insert(
            field.to_string(),
            FieldEntry {
                value: value.to_string(),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn get(&self, field: &str) -> CacheResult<Option<String>> {
        let now = Utc::now();
        {
            let store = self.store.read().await;
            match store.get(&self.key).and_then(|entry| entry.fields.get(field)) {
                None => return Ok(None),
                Some(f) if !f.is_expired(now) => return Ok(Some(f.value.clone())),
                Some(_) => {}
            }
        }

        // Expired, purge it
        let mut store = self.store.write().await;
        if let Some(entry) = store.get_mut(&self.key) {
            return Ok(entry.live_field(field, now).map(|f| f.value.clone()));
        }
        Ok(None)
    }

    async fn expire(&self, field: &str, ttl: Duration) -> CacheResult<bool> {
        let now = Utc::now();
        let expires_at = deadline(now, ttl)?;
        let mut store = self.store.write().await;
        let Some(entry) = store.get_mut(&self.key) else {
            return Ok(false);
        };
        match entry.live_field(field, now) {
            Some(f) => {
                f.expires_at = Some(expires_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, field: &str) -> CacheResult<Option<Duration>> {
        let now = Utc::now();
        let mut store = self.store.write().await;
        let Some(entry) = store.get_mut(&self.key) else {
            return Ok(None);
        };
        Ok(entry
            .live_field(field, now)
            .and_then(|f| f.expires_at)
            .map(|exp| Duration::from_secs((exp - now).num_seconds().max(0) as u64)))
    }

    async fn delete(&self, field: &str) -> CacheResult<bool> {
        let now = Utc::now();
        let mut store = self.store.write().await;
        let Some(entry) = store.get_mut(&self.key) else {
            return Ok(false);
        };
        let existed = entry.live_field(field, now).is_some();
        entry.fields.remove(field);
        Ok(existed)
    }
}
