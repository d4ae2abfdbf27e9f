use std::sync::Arc;

use grantwatch_core::{AppError, AppResult, ResourceId};
use grantwatch_domain::{Baseline, BaselineInput, Snapshot};
use uuid::Uuid;

use crate::clock::Clock;
use crate::detection_ports::{
    BaselineRepository, BaselineSummary, ChangeRepository, PermissionSource,
};

/// Application service for the baseline lifecycle.
pub struct BaselineService {
    baselines: Arc<dyn BaselineRepository>,
    changes: Arc<dyn ChangeRepository>,
    source: Arc<dyn PermissionSource>,
    clock: Arc<dyn Clock>,
}

impl BaselineService {
    /// Creates a new baseline service.
    #[must_use]
    pub fn new(
        baselines: Arc<dyn BaselineRepository>,
        changes: Arc<dyn ChangeRepository>,
        source: Arc<dyn PermissionSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            baselines,
            changes,
            source,
            clock,
        }
    }

    /// Stores one snapshot as a named baseline, inactive until activated.
    pub async fn create(
        &self,
        resource_id: ResourceId,
        name: &str,
        snapshot: Snapshot,
        created_by: Option<String>,
    ) -> AppResult<Baseline> {
        let baseline = Baseline::new(BaselineInput {
            id: Uuid::new_v4(),
            resource_id,
            name: name.to_owned(),
            snapshot,
            created_at: self.clock.now(),
            created_by,
            is_active: false,
        })?;

        self.baselines.insert(baseline.clone()).await?;
        Ok(baseline)
    }

    /// Captures the current source state and stores it as a baseline.
    pub async fn create_from_source(
        &self,
        resource_id: ResourceId,
        name: &str,
        created_by: Option<String>,
    ) -> AppResult<Baseline> {
        let snapshot = self.source.fetch_snapshot(&resource_id).await?;
        self.create(resource_id, name, snapshot, created_by).await
    }

    /// Makes one baseline the active comparison reference for its resource.
    ///
    /// Any previously active baseline of the same resource is deactivated in
    /// the same transaction.
    pub async fn activate(&self, baseline_id: Uuid) -> AppResult<()> {
        self.baselines.activate(baseline_id).await
    }

    /// Clears the active flag on one baseline.
    pub async fn deactivate(&self, baseline_id: Uuid) -> AppResult<()> {
        self.baselines.deactivate(baseline_id).await
    }

    /// Returns the active baseline for one resource, when present.
    pub async fn get_active(&self, resource_id: &ResourceId) -> AppResult<Option<Baseline>> {
        self.baselines.find_active(resource_id).await
    }

    /// Returns one baseline by id, snapshot included.
    pub async fn get(&self, baseline_id: Uuid) -> AppResult<Baseline> {
        self.baselines
            .find(baseline_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("baseline '{baseline_id}' not found")))
    }

    /// Lists baseline summaries, optionally scoped to one resource.
    pub async fn list(
        &self,
        resource_id: Option<&ResourceId>,
        include_inactive: bool,
    ) -> AppResult<Vec<BaselineSummary>> {
        self.baselines.list(resource_id, include_inactive).await
    }

    /// Deletes one baseline.
    ///
    /// Refused while detected changes still reference the baseline.
    pub async fn delete(&self, baseline_id: Uuid) -> AppResult<()> {
        let referencing = self.changes.count_for_baseline(baseline_id).await?;
        if referencing > 0 {
            return Err(AppError::Conflict(format!(
                "baseline '{baseline_id}' is referenced by {referencing} detected change(s)"
            )));
        }

        self.baselines.delete(baseline_id).await
    }
}
