//! Redis-based field hash implementation
//!
//! Per-field expiry relies on `HEXPIRE` and `HTTL`, available from Redis 7.4.

use super::FieldTtlHash;
use crate::cache::{CacheError, CacheResult};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;

// HEXPIRE / HTTL per-field reply codes
const FIELD_MISSING: i64 = -2;
const FIELD_NO_TTL: i64 = -1;

/// Redis-based field hash implementation
#[derive(Clone)]
pub struct RedisFieldHash {
    key: String,
    client: redis::Client,
    connection: Arc<tokio::sync::Mutex<Option<redis::aio::MultiplexedConnection>>>,
}

impl RedisFieldHash {
    pub fn new(redis_url: &str, key: impl Into<String>) -> CacheResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CacheError::Cache(format!("Redis client error: {}", e)))?;

        Ok(Self::from_client(client, key))
    }

    /// Create Redis field hash from existing client (for pre-initialized clients)
    pub fn from_client(client: redis::Client, key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            client,
            connection: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get a working Redis connection, creating or reusing existing one
    async fn get_connection(&self) -> CacheResult<redis::aio::MultiplexedConnection> {
        let mut conn_guard = self.connection.lock().await;

        if let Some(conn) = conn_guard.take() {
            if self.test_connection(&conn).await.is_ok() {
                return Ok(conn);
            }
        }

        let new_conn = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| CacheError::Connection(format!("Connection failed: {}", e)))?;

        Ok(new_conn)
    }

    async fn test_connection(
        &self,
        conn: &redis::aio::MultiplexedConnection,
    ) -> Result<(), redis::RedisError> {
        let mut conn = conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Return connection to storage for reuse
    async fn return_connection(&self, conn: redis::aio::MultiplexedConnection) {
        *self.connection.lock().await = Some(conn);
    }

    /// Health check - test Redis connectivity
    pub async fn health_check(&self) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Cache(format!("Ping failed: {}", e)))?;

        self.return_connection(conn).await;
        Ok(())
    }

    fn hexpire_cmd(&self, field: &str, ttl: Duration) -> redis::Cmd {
        let mut cmd = redis::cmd("HEXPIRE");
        cmd.arg(&self.key)
            .arg(ttl_seconds(ttl))
            .arg("FIELDS")
            .arg(1)
            .arg(field);
        cmd
    }
}

/// Redis TTLs are whole seconds, and a zero TTL deletes the field
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

fn first_code(codes: Vec<i64>) -> CacheResult<i64> {
    codes
        .first()
        .copied()
        .ok_or_else(|| CacheError::Cache("Empty reply from per-field TTL command".to_string()))
}

#[async_trait]
impl FieldTtlHash for RedisFieldHash {
    async fn set_with_ttl(&self, field: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset(&self.key, field, value)
            .ignore()
            .add_command(self.hexpire_cmd(field, ttl))
            .ignore();

        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Cache(e.to_string()))?;

        self.return_connection(conn).await;
        Ok(())
    }

    async fn get(&self, field: &str) -> CacheResult<Option<String>> {
        let mut conn = self.get_connection().await?;

        let result: Option<String> = conn
            .hget(&self.key, field)
            .await
            .map_err(|e| CacheError::Cache(e.to_string()))?;

        self.return_connection(conn).await;
        Ok(result)
    }

    async fn expire(&self, field: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.get_connection().await?;

        let codes: Vec<i64> = self
            .hexpire_cmd(field, ttl)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Cache(e.to_string()))?;

        self.return_connection(conn).await;
        Ok(first_code(codes)? != FIELD_MISSING)
    }

    async fn ttl(&self, field: &str) -> CacheResult<Option<Duration>> {
        let mut conn = self.get_connection().await?;

        let codes: Vec<i64> = redis::cmd("HTTL")
            .arg(&self.key)
            .arg("FIELDS")
            .arg(1)
            .arg(field)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Cache(e.to_string()))?;

        self.return_connection(conn).await;
        match first_code(codes)? {
            FIELD_MISSING | FIELD_NO_TTL => Ok(None),
            secs => Ok(Some(Duration::from_secs(secs.max(0) as u64))),
        }
    }

    async fn delete(&self, field: &str) -> CacheResult<bool> {
        let mut conn = self.get_connection().await?;

        let removed: i64 = conn
            .hdel(&self.key, field)
            .await
            .map_err(|e| CacheError::Cache(e.to_string()))?;

        self.return_connection(conn).await;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hexpire_command_layout() {
        let hash = RedisFieldHash::new("redis://localhost:6379", "identity:refresh_sessions")
            .unwrap();
        let packed = hash
            .hexpire_cmd("field-a", Duration::from_secs(2_592_000))
            .get_packed_command();
        let text = String::from_utf8_lossy(&packed);

        assert!(text.contains("HEXPIRE"));
        assert!(text.contains("identity:refresh_sessions"));
        assert!(text.contains("2592000"));
        assert!(text.contains("FIELDS"));
        assert!(text.contains("field-a"));
    }

    #[test]
    fn test_sub_second_ttl_rounds_up() {
        assert_eq!(ttl_seconds(Duration::from_millis(10)), 1);
        assert_eq!(ttl_seconds(Duration::from_secs(30)), 30);
    }

    #[test]
    fn test_first_code_requires_reply() {
        assert!(first_code(vec![]).is_err());
        assert_eq!(first_code(vec![1]).unwrap(), 1);
    }
}
