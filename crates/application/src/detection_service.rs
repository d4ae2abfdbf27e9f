use std::sync::Arc;

use chrono::Duration;
use grantwatch_core::{AppError, AppResult, ResourceId};
use uuid::Uuid;

use crate::clock::Clock;
use crate::detection_ports::{
    BaselineRepository, Change, ChangeRepository, ComparisonCache, CycleFailureKind, DetectionRun,
    DetectionRunRepository, PermissionSource,
};

const DEFAULT_CYCLE_TIMEOUT_SECONDS: u64 = 300;
const DEFAULT_STALE_RUN_SECONDS: u32 = 900;
const DEFAULT_COMPARISON_CACHE_TTL_SECONDS: u32 = 300;

/// Outcome of one detection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionOutcome {
    /// Cycle finished and persisted any new drift.
    Completed {
        /// Run row recording the cycle.
        run_id: Uuid,
        /// Number of newly persisted changes.
        new_changes: usize,
    },
    /// The resource has no active baseline; the source was not contacted.
    NoActiveBaseline {
        /// Run row recording the no-op.
        run_id: Uuid,
    },
    /// Another cycle already holds the resource's in-flight marker.
    AlreadyRunning,
    /// Cycle aborted; the failure is recorded on the run row.
    Failed {
        /// Run row recording the failure.
        run_id: Uuid,
        /// Failure classification.
        kind: CycleFailureKind,
        /// Failure details.
        message: String,
    },
}

/// Application service running detection cycles against active baselines.
pub struct DetectionService {
    baselines: Arc<dyn BaselineRepository>,
    changes: Arc<dyn ChangeRepository>,
    runs: Arc<dyn DetectionRunRepository>,
    source: Arc<dyn PermissionSource>,
    clock: Arc<dyn Clock>,
    comparison_cache: Option<Arc<dyn ComparisonCache>>,
    comparison_cache_ttl_seconds: u32,
    cycle_timeout_seconds: u64,
    stale_run_threshold_seconds: u32,
}

impl DetectionService {
    /// Creates a new detection service.
    #[must_use]
    pub fn new(
        baselines: Arc<dyn BaselineRepository>,
        changes: Arc<dyn ChangeRepository>,
        runs: Arc<dyn DetectionRunRepository>,
        source: Arc<dyn PermissionSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            baselines,
            changes,
            runs,
            source,
            clock,
            comparison_cache: None,
            comparison_cache_ttl_seconds: DEFAULT_COMPARISON_CACHE_TTL_SECONDS,
            cycle_timeout_seconds: DEFAULT_CYCLE_TIMEOUT_SECONDS,
            stale_run_threshold_seconds: DEFAULT_STALE_RUN_SECONDS,
        }
    }

    /// Adds an advisory comparison cache with the given ttl.
    #[must_use]
    pub fn with_comparison_cache(
        mut self,
        cache: Arc<dyn ComparisonCache>,
        ttl_seconds: u32,
    ) -> Self {
        self.comparison_cache = Some(cache);
        self.comparison_cache_ttl_seconds = ttl_seconds;
        self
    }

    /// Replaces the cycle deadline.
    #[must_use]
    pub fn with_cycle_timeout_seconds(mut self, seconds: u64) -> Self {
        self.cycle_timeout_seconds = seconds;
        self
    }

    /// Replaces the threshold after which a `running` run row is treated as
    /// left behind by a crashed cycle.
    #[must_use]
    pub fn with_stale_run_threshold_seconds(mut self, seconds: u32) -> Self {
        self.stale_run_threshold_seconds = seconds;
        self
    }

    /// Lists changes for one baseline, newest first.
    pub async fn list_changes(
        &self,
        baseline_id: Uuid,
        reviewed: Option<bool>,
        limit: usize,
    ) -> AppResult<Vec<Change>> {
        if limit == 0 {
            return Err(AppError::Validation(
                "limit must be greater than zero".to_owned(),
            ));
        }

        self.changes
            .list_for_baseline(baseline_id, reviewed, limit)
            .await
    }

    /// Lists changes detected in the trailing `since_days` window.
    pub async fn list_recent_changes(
        &self,
        resource_id: Option<&ResourceId>,
        since_days: u32,
        reviewed: Option<bool>,
    ) -> AppResult<Vec<Change>> {
        if since_days == 0 {
            return Err(AppError::Validation(
                "since_days must be greater than zero".to_owned(),
            ));
        }

        let since = self.clock.now() - Duration::days(i64::from(since_days));
        self.changes.list_recent(resource_id, since, reviewed).await
    }

    /// Marks one change reviewed.
    pub async fn mark_reviewed(&self, change_id: Uuid, reviewed_by: &str) -> AppResult<Change> {
        if reviewed_by.trim().is_empty() {
            return Err(AppError::Validation(
                "reviewed_by must not be empty".to_owned(),
            ));
        }

        self.changes
            .mark_reviewed(change_id, reviewed_by.trim(), self.clock.now())
            .await
    }

    /// Lists resources eligible for scheduled detection: those with an
    /// active baseline and at least one registered recipient.
    pub async fn monitored_resources(&self) -> AppResult<Vec<ResourceId>> {
        self.baselines.list_monitored_resources().await
    }

    /// Lists recent detection runs, newest first.
    pub async fn list_recent_runs(
        &self,
        resource_id: Option<&ResourceId>,
        limit: usize,
    ) -> AppResult<Vec<DetectionRun>> {
        if limit == 0 {
            return Err(AppError::Validation(
                "limit must be greater than zero".to_owned(),
            ));
        }

        self.runs.list_recent(resource_id, limit).await
    }
}

mod cycle;

#[cfg(test)]
mod tests;
