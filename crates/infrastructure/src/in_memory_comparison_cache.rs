use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use grantwatch_application::ComparisonCache;
use grantwatch_core::AppResult;
use grantwatch_domain::GrantChange;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct ComparisonCacheEntry {
    changes: Vec<GrantChange>,
    expires_at: Instant,
}

/// In-memory cache adapter for comparison results.
///
/// Entries are advisory, so eviction is lazy: an expired entry is dropped
/// the next time its key is read.
#[derive(Default)]
pub struct InMemoryComparisonCache {
    entries: RwLock<HashMap<String, ComparisonCacheEntry>>,
}

impl InMemoryComparisonCache {
    /// Creates an empty in-memory comparison cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ComparisonCache for InMemoryComparisonCache {
    async fn get_changes(&self, key: &str) -> AppResult<Option<Vec<GrantChange>>> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key) {
                if entry.expires_at > Instant::now() {
                    return Ok(Some(entry.changes.clone()));
                }
            } else {
                return Ok(None);
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

    async fn set_changes(
        &self,
        key: &str,
        changes: Vec<GrantChange>,
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
            ComparisonCacheEntry {
                changes,
                expires_at,
            },
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use grantwatch_application::{ComparisonCache, comparison_cache_key};
    use grantwatch_domain::GrantChange;
    use uuid::Uuid;

    use super::InMemoryComparisonCache;

    fn sample_changes() -> Vec<GrantChange> {
        vec![GrantChange::Added {
            resource_path: "/docs/finance".to_owned(),
            principal_id: "alice@example.test".to_owned(),
            role: "Read".to_owned(),
        }]
    }

    #[tokio::test]
    async fn stored_entries_are_returned_until_expiry() {
        let cache = InMemoryComparisonCache::new();
        let key = comparison_cache_key(Uuid::new_v4(), "aaaa", "bbbb");

        let stored = cache.set_changes(key.as_str(), sample_changes(), 300).await;
        assert!(stored.is_ok());

        let hit = cache.get_changes(key.as_str()).await;
        assert_eq!(hit.unwrap_or_default(), Some(sample_changes()));

        let miss = cache.get_changes("unknown-key").await;
        assert_eq!(miss.unwrap_or_default(), None);
    }

    #[tokio::test]
    async fn zero_ttl_disables_storage() {
        let cache = InMemoryComparisonCache::new();
        let key = comparison_cache_key(Uuid::new_v4(), "aaaa", "bbbb");

        let stored = cache.set_changes(key.as_str(), sample_changes(), 0).await;
        assert!(stored.is_ok());

        let lookup = cache.get_changes(key.as_str()).await;
        assert_eq!(lookup.unwrap_or_default(), None);
    }
}
