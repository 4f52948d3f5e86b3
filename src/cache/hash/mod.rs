//! Shared hashes whose fields expire independently
//!
//! Each field carries its own TTL, which maps onto Redis 7.4 `HEXPIRE`/`HTTL`
//! for the Redis backend and onto per-field deadlines for the memory backend.

use super::CacheResult;
use async_trait::async_trait;
use std::time::Duration;

pub mod memory;
pub mod redis;

pub use memory::MemoryFieldHash;
pub use redis::RedisFieldHash;

/// Operations on one hash with per-field expiry
#[async_trait]
pub trait FieldTtlHash: Send + Sync {
    /// Write a field and its TTL as one atomic unit
    async fn set_with_ttl(&self, field: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Read a field, `None` when absent or expired
    async fn get(&self, field: &str) -> CacheResult<Option<String>>;

    /// Replace a field's TTL without touching its value.
    /// Returns `false` when the field does not exist.
    async fn expire(&self, field: &str, ttl: Duration) -> CacheResult<bool>;

    /// Remaining lifetime of a field
    async fn ttl(&self, field: &str) -> CacheResult<Option<Duration>>;

    /// Remove a field, returns whether it existed
    async fn delete(&self, field: &str) -> CacheResult<bool>;
}

/// Field hash backend implementations
#[derive(Clone)]
pub enum FieldHashBackend {
    Memory(MemoryFieldHash),
    Redis(RedisFieldHash),
}

/// Handle to one named hash in the configured backend
#[derive(Clone)]
pub struct FieldHash {
    backend: FieldHashBackend,
    key: String,
}

/// Macro to generate FieldHash methods with enum delegation
macro_rules! impl_enum_delegation {
    ($($method:ident($($param:ident: $param_type:ty),*) -> $return_type:ty;)*) => {
        $(
            pub async fn $method(&self, $($param: $param_type),*) -> CacheResult<$return_type> {
                match &self.backend {
                    FieldHashBackend::Memory(hash) => hash.$method($($param),*).await,
                    FieldHashBackend::Redis(hash) => hash.$method($($param),*).await,
                }
            }
        )*
    };
}

impl FieldHash {
    pub fn new(backend: FieldHashBackend, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// Full (prefixed) key of the hash
    pub fn key(&self) -> &str {
        &self.key
    }

    impl_enum_delegation! {
        set_with_ttl(field: &str, value: &str, ttl: Duration) -> ();
        get(field: &str) -> Option<String>;
        expire(field: &str, ttl: Duration) -> bool;
        ttl(field: &str) -> Option<Duration>;
        delete(field: &str) -> bool;
    }
}
