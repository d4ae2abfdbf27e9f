use async_trait::async_trait;
use grantwatch_core::{AppResult, ResourceId};
use grantwatch_domain::Snapshot;

/// Port over the system of record for live access grants.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    /// Captures the current flat list of grants for one resource tree.
    ///
    /// Fails with `AppError::SourceUnavailable` on transport or auth
    /// failures and with `AppError::MalformedSnapshot` when the source
    /// returns rows missing required fields.
    async fn fetch_snapshot(&self, resource_id: &ResourceId) -> AppResult<Snapshot>;
}
