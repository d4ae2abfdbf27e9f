use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grantwatch_core::{AppResult, ResourceId};
use grantwatch_domain::Baseline;
use uuid::Uuid;

/// Listing row for one baseline, without the full snapshot payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineSummary {
    /// Baseline identifier.
    pub id: Uuid,
    /// Resource tree the baseline belongs to.
    pub resource_id: ResourceId,
    /// Baseline name, unique within the resource.
    pub name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Optional identity of the creator.
    pub created_by: Option<String>,
    /// Whether the baseline is the active comparison reference.
    pub is_active: bool,
    /// Number of grants captured in the baseline snapshot.
    pub grant_count: i64,
}

/// Repository port for baseline persistence.
#[async_trait]
pub trait BaselineRepository: Send + Sync {
    /// Inserts one baseline.
    ///
    /// Fails with `AppError::DuplicateName` when the resource already has a
    /// baseline with the same name.
    async fn insert(&self, baseline: Baseline) -> AppResult<()>;

    /// Returns one baseline by id, snapshot included.
    async fn find(&self, baseline_id: Uuid) -> AppResult<Option<Baseline>>;

    /// Returns the active baseline for one resource, when present.
    async fn find_active(&self, resource_id: &ResourceId) -> AppResult<Option<Baseline>>;

    /// Lists baseline summaries, optionally scoped to one resource.
    async fn list(
        &self,
        resource_id: Option<&ResourceId>,
        include_inactive: bool,
    ) -> AppResult<Vec<BaselineSummary>>;

    /// Activates one baseline and deactivates every other baseline of the
    /// same resource in a single transaction.
    ///
    /// Fails with `AppError::NotFound` on an unknown id.
    async fn activate(&self, baseline_id: Uuid) -> AppResult<()>;

    /// Clears the active flag on one baseline.
    ///
    /// Fails with `AppError::NotFound` on an unknown id.
    async fn deactivate(&self, baseline_id: Uuid) -> AppResult<()>;

    /// Deletes one baseline.
    ///
    /// Fails with `AppError::NotFound` on an unknown id and with
    /// `AppError::Conflict` while detected changes still reference it.
    async fn delete(&self, baseline_id: Uuid) -> AppResult<()>;

    /// Lists resources that have an active baseline and at least one
    /// notification recipient.
    async fn list_monitored_resources(&self) -> AppResult<Vec<ResourceId>>;
}
