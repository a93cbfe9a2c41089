//! Redis-backed permission context cache.

use async_trait::async_trait;
use leasehold_application::PermissionContextCache;
use leasehold_core::{AppError, AppResult};
use leasehold_domain::PermissionContext;
use redis::AsyncCommands;

/// Redis implementation of the permission context cache port.
#[derive(Clone)]
pub struct RedisPermissionContextCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisPermissionContextCache {
    /// Creates a cache adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, key: &str) -> String {
        format!("{}:{key}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl PermissionContextCache for RedisPermissionContextCache {
    async fn get_context(&self, key: &str) -> AppResult<Option<PermissionContext>> {
        let mut connection = self.connection().await?;

        let encoded: Option<String> =
            connection.get(self.key_for(key)).await.map_err(|error| {
                AppError::Internal(format!(
                    "failed to read permission context cache entry: {error}"
                ))
            })?;

        encoded
            .as_deref()
            .map(|value| {
                serde_json::from_str::<PermissionContext>(value).map_err(|error| {
                    AppError::Internal(format!(
                        "invalid permission context cache value for '{key}': {error}"
                    ))
                })
            })
            .transpose()
    }

    async fn set_context(
        &self,
        key: &str,
        context: &PermissionContext,
        ttl_seconds: u32,
    ) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let value = serde_json::to_string(context).map_err(|error| {
            AppError::Internal(format!("failed to encode permission context: {error}"))
        })?;
        let mut connection = self.connection().await?;

        connection
            .set_ex(self.key_for(key), value, u64::from(ttl_seconds))
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to write permission context cache entry: {error}"
                ))
            })
    }

    async fn invalidate(&self, key: &str) -> AppResult<()> {
        let mut connection = self.connection().await?;

        connection.del(self.key_for(key)).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to delete permission context cache entry: {error}"
            ))
        })
    }
}
