use async_trait::async_trait;
use grantwatch_core::AppResult;
use grantwatch_domain::GrantChange;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Optional memoization port for comparison results.
///
/// Entries are advisory: evicting one at any time only costs a recompute.
#[async_trait]
pub trait ComparisonCache: Send + Sync {
    /// Returns the cached comparison result for one key.
    async fn get_changes(&self, key: &str) -> AppResult<Option<Vec<GrantChange>>>;

    /// Stores one comparison result with ttl.
    async fn set_changes(
        &self,
        key: &str,
        changes: Vec<GrantChange>,
        ttl_seconds: u32,
    ) -> AppResult<()>;
}

/// Derives the cache key for one baseline/live snapshot pair.
#[must_use]
pub fn comparison_cache_key(baseline_id: Uuid, baseline_hash: &str, live_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(baseline_id.as_bytes());
    hasher.update(baseline_hash.as_bytes());
    hasher.update(live_hash.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::comparison_cache_key;

    #[test]
    fn cache_key_changes_with_the_live_hash() {
        let baseline_id = Uuid::new_v4();
        let unchanged = comparison_cache_key(baseline_id, "aaaa", "bbbb");

        assert_eq!(
            unchanged,
            comparison_cache_key(baseline_id, "aaaa", "bbbb")
        );
        assert_ne!(
            unchanged,
            comparison_cache_key(baseline_id, "aaaa", "cccc")
        );
    }
}
