use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use leasehold_application::PermissionContextCache;
use leasehold_core::AppResult;
use leasehold_domain::PermissionContext;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct ContextCacheEntry {
    context: PermissionContext,
    expires_at: Instant,
}

/// In-memory cache adapter for resolved permission contexts.
#[derive(Debug, Default)]
pub struct InMemoryPermissionContextCache {
    entries: RwLock<HashMap<String, ContextCacheEntry>>,
}

impl InMemoryPermissionContextCache {
    /// Creates an empty in-memory context cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionContextCache for InMemoryPermissionContextCache {
    async fn get_context(&self, key: &str) -> AppResult<Option<PermissionContext>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.context.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            entries.remove(key);
        }

        Ok(None)
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

        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(u64::from(ttl_seconds)))
            .unwrap_or(now);

        self.entries.write().await.insert(
            key.to_owned(),
            ContextCacheEntry {
                context: context.clone(),
                expires_at,
            },
        );

        Ok(())
    }

    async fn invalidate(&self, key: &str) -> AppResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use leasehold_application::PermissionContextCache;
    use leasehold_domain::PermissionContext;

    use super::InMemoryPermissionContextCache;

    #[tokio::test]
    async fn stores_and_invalidates_contexts() {
        let cache = InMemoryPermissionContextCache::new();
        let context = PermissionContext::full_access().managed_by("m1");

        assert!(cache.set_context("owner:o1", &context, 30).await.is_ok());
        assert_eq!(
            cache.get_context("owner:o1").await.ok().flatten(),
            Some(context)
        );

        assert!(cache.invalidate("owner:o1").await.is_ok());
        assert_eq!(cache.get_context("owner:o1").await.ok().flatten(), None);
    }

    #[tokio::test]
    async fn zero_ttl_skips_write() {
        let cache = InMemoryPermissionContextCache::new();

        assert!(
            cache
                .set_context("owner:o1", &PermissionContext::full_access(), 0)
                .await
                .is_ok()
        );
        assert_eq!(cache.get_context("owner:o1").await.ok().flatten(), None);
    }
}
