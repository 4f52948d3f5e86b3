//! Cache layer for shared session state
//!
//! Refresh sessions live in a shared hash so that every service instance
//! sees the same records. The memory backend serves tests and single-instance
//! deployments, Redis serves everything else.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

pub mod config;
pub mod hash;

pub use hash::{FieldHash, FieldHashBackend, FieldTtlHash, MemoryFieldHash, RedisFieldHash};

use crate::cache::config::CacheConfig;
use crate::health::{HealthCheckResult, HealthChecker};

/// Cache error types
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Shared memory store backend for all field hashes
pub type SharedMemoryStore = Arc<RwLock<HashMap<String, hash::memory::HashEntry>>>;

/// Cache manager - creates FieldHash handles
#[derive(Clone)]
pub struct CacheManager {
    config: CacheConfig,
    redis_client: Option<redis::Client>,
    memory_store: Option<SharedMemoryStore>,
}

impl CacheManager {
    /// Create new cache manager with memory cache (for testing/single instance)
    pub fn new_memory() -> Self {
        Self {
            config: CacheConfig {
                backend: "memory".to_string(),
                ..Default::default()
            },
            redis_client: None,
            memory_store: Some(Arc::new(RwLock::new(HashMap::new()))),
        }
    }

    /// Create cache manager from configuration
    pub async fn new_from_config(config: &CacheConfig) -> CacheResult<Self> {
        let redis_client = if config.backend == "redis" {
            let client = redis::Client::open(config.redis_url.as_str()).map_err(|e| {
                CacheError::Connection(format!("Redis client creation failed: {}", e))
            })?;

            // Fail early if Redis is not available
            let mut conn = client
                .get_multiplexed_tokio_connection()
                .await
                .map_err(|e| CacheError::Connection(format!("Redis connection failed: {}", e)))?;

            redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await
                .map_err(|e| CacheError::Connection(format!("Redis ping failed: {}", e)))?;

            tracing::info!(url = %config.redis_url, "Connected to Redis cache");
            Some(client)
        } else {
            None
        };

        let memory_store = if config.backend == "memory" {
            Some(Arc::new(RwLock::new(HashMap::new())))
        } else {
            None
        };

        if redis_client.is_none() && memory_store.is_none() {
            return Err(CacheError::Cache(format!(
                "Unknown cache backend: {}",
                config.backend
            )));
        }

        Ok(Self {
            config: config.clone(),
            redis_client,
            memory_store,
        })
    }

    /// Get a handle to the shared hash stored under `key` (prefix applied)
    pub fn hash(&self, key: &str) -> CacheResult<FieldHash> {
        let prefixed_key = self.config.prefixed_key(key);

        let backend = if let Some(client) = &self.redis_client {
            FieldHashBackend::Redis(RedisFieldHash::from_client(
                client.clone(),
                prefixed_key.clone(),
            ))
        } else if let Some(store) = &self.memory_store {
            FieldHashBackend::Memory(MemoryFieldHash::from_shared_store(
                store.clone(),
                prefixed_key.clone(),
            ))
        } else {
            return Err(CacheError::Cache("No cache backend initialized".to_string()));
        };

        Ok(FieldHash::new(backend, prefixed_key))
    }

    pub async fn health_check(&self) -> HealthCheckResult {
        match &self.redis_client {
            Some(client) => {
                let probe = RedisFieldHash::from_client(client.clone(), "health");
                match probe.health_check().await {
                    Ok(_) => HealthCheckResult::healthy_with_details(serde_json::json!({
                        "backend": "redis",
                        "status": "healthy",
                        "connection": "ok"
                    })),
                    Err(err) => HealthCheckResult::unhealthy_with_details(
                        "Redis health check failed".to_string(),
                        serde_json::json!({
                            "backend": "redis",
                            "status": "unhealthy",
                            "error": err.to_string()
                        }),
                    ),
                }
            }
            // Memory cache always passes health check
            None => HealthCheckResult::healthy_with_details(serde_json::json!({
                "backend": "memory",
                "status": "healthy"
            })),
        }
    }

    fn backend_type(&self) -> &str {
        &self.config.backend
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new_memory()
    }
}

#[async_trait::async_trait]
impl HealthChecker for CacheManager {
    fn name(&self) -> &str {
        "cache"
    }

    async fn check(&self) -> HealthCheckResult {
        self.health_check().await
    }

    fn info(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "service": "Cache Manager",
            "backend": self.backend_type()
        }))
    }
}
