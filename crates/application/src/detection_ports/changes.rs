use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grantwatch_core::{AppResult, ResourceId};
use grantwatch_domain::{ChangeKind, GrantChange};
use uuid::Uuid;

/// Persisted drift record produced by one detection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Change identifier.
    pub id: Uuid,
    /// Baseline the live state was compared against.
    pub baseline_id: Uuid,
    /// When the detection cycle observed the drift.
    pub detected_at: DateTime<Utc>,
    /// Kind of drift.
    pub kind: ChangeKind,
    /// Path of the affected resource node.
    pub resource_path: String,
    /// Affected principal.
    pub principal_id: String,
    /// Role recorded in the baseline, absent for additions.
    pub old_role: Option<String>,
    /// Role observed live, absent for removals.
    pub new_role: Option<String>,
    /// Whether an operator has reviewed the change.
    pub reviewed: bool,
    /// Identity of the reviewer, when reviewed.
    pub reviewed_by: Option<String>,
    /// Review timestamp, when reviewed.
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Repository port for detected changes.
#[async_trait]
pub trait ChangeRepository: Send + Sync {
    /// Persists comparator output as one atomic batch.
    ///
    /// Rows already present among the baseline's unreviewed changes, matched
    /// by resource path, principal, and kind, are skipped. Returns only the
    /// newly inserted rows; an empty result means no new drift.
    async fn insert_new_changes(
        &self,
        baseline_id: Uuid,
        detected_at: DateTime<Utc>,
        changes: &[GrantChange],
    ) -> AppResult<Vec<Change>>;

    /// Lists changes for one baseline, newest first.
    async fn list_for_baseline(
        &self,
        baseline_id: Uuid,
        reviewed: Option<bool>,
        limit: usize,
    ) -> AppResult<Vec<Change>>;

    /// Lists changes detected at or after a cutoff, newest first, optionally
    /// scoped to one resource.
    async fn list_recent(
        &self,
        resource_id: Option<&ResourceId>,
        since: DateTime<Utc>,
        reviewed: Option<bool>,
    ) -> AppResult<Vec<Change>>;

    /// Marks one change reviewed.
    ///
    /// Fails with `AppError::NotFound` on an unknown id and with
    /// `AppError::Conflict` when the change is already reviewed.
    async fn mark_reviewed(
        &self,
        change_id: Uuid,
        reviewed_by: &str,
        reviewed_at: DateTime<Utc>,
    ) -> AppResult<Change>;

    /// Counts changes referencing one baseline.
    async fn count_for_baseline(&self, baseline_id: Uuid) -> AppResult<i64>;
}
