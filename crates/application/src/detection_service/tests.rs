use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use grantwatch_core::{AppError, AppResult, ResourceId};
use grantwatch_domain::{
    Baseline, BaselineInput, ChangeKind, Grant, GrantChange, GrantInput, PrincipalKind, Snapshot,
};

use crate::clock::Clock;
use crate::detection_ports::{
    BaselineRepository, BaselineSummary, Change, ChangeRepository, ComparisonCache,
    CycleFailureKind, DetectionRun, DetectionRunRepository, DetectionRunStatus, PermissionSource,
};

use super::{DetectionOutcome, DetectionService};

#[derive(Default)]
struct FakeBaselineRepository {
    active: Mutex<Option<Baseline>>,
}

#[async_trait]
impl BaselineRepository for FakeBaselineRepository {
    async fn insert(&self, baseline: Baseline) -> AppResult<()> {
        *self.active.lock().await = Some(baseline);
        Ok(())
    }

    async fn find(&self, baseline_id: Uuid) -> AppResult<Option<Baseline>> {
        Ok(self
            .active
            .lock()
            .await
            .clone()
            .filter(|baseline| baseline.id() == baseline_id))
    }

    async fn find_active(&self, resource_id: &ResourceId) -> AppResult<Option<Baseline>> {
        Ok(self
            .active
            .lock()
            .await
            .clone()
            .filter(|baseline| baseline.resource_id() == resource_id && baseline.is_active()))
    }

    async fn list(
        &self,
        _resource_id: Option<&ResourceId>,
        _include_inactive: bool,
    ) -> AppResult<Vec<BaselineSummary>> {
        Ok(Vec::new())
    }

    async fn activate(&self, baseline_id: Uuid) -> AppResult<()> {
        Err(AppError::NotFound(format!(
            "baseline '{baseline_id}' not found"
        )))
    }

    async fn deactivate(&self, baseline_id: Uuid) -> AppResult<()> {
        Err(AppError::NotFound(format!(
            "baseline '{baseline_id}' not found"
        )))
    }

    async fn delete(&self, baseline_id: Uuid) -> AppResult<()> {
        Err(AppError::NotFound(format!(
            "baseline '{baseline_id}' not found"
        )))
    }

    async fn list_monitored_resources(&self) -> AppResult<Vec<ResourceId>> {
        Ok(self
            .active
            .lock()
            .await
            .iter()
            .map(|baseline| baseline.resource_id().clone())
            .collect())
    }
}

#[derive(Default)]
struct FakeChangeRepository {
    rows: Mutex<Vec<Change>>,
}

#[async_trait]
impl ChangeRepository for FakeChangeRepository {
    async fn insert_new_changes(
        &self,
        baseline_id: Uuid,
        detected_at: DateTime<Utc>,
        changes: &[GrantChange],
    ) -> AppResult<Vec<Change>> {
        let mut rows = self.rows.lock().await;
        let mut inserted = Vec::new();
        for change in changes {
            let duplicate = rows.iter().any(|row| {
                row.baseline_id == baseline_id
                    && !row.reviewed
                    && row.resource_path == change.resource_path()
                    && row.principal_id == change.principal_id()
                    && row.kind == change.kind()
            });
            if duplicate {
                continue;
            }

            let row = Change {
                id: Uuid::new_v4(),
                baseline_id,
                detected_at,
                kind: change.kind(),
                resource_path: change.resource_path().to_owned(),
                principal_id: change.principal_id().to_owned(),
                old_role: change.old_role().map(str::to_owned),
                new_role: change.new_role().map(str::to_owned),
                reviewed: false,
                reviewed_by: None,
                reviewed_at: None,
            };
            rows.push(row.clone());
            inserted.push(row);
        }

        Ok(inserted)
    }

    async fn list_for_baseline(
        &self,
        baseline_id: Uuid,
        reviewed: Option<bool>,
        limit: usize,
    ) -> AppResult<Vec<Change>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter(|row| row.baseline_id == baseline_id)
            .filter(|row| reviewed.is_none_or(|flag| row.reviewed == flag))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_recent(
        &self,
        _resource_id: Option<&ResourceId>,
        since: DateTime<Utc>,
        reviewed: Option<bool>,
    ) -> AppResult<Vec<Change>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter(|row| row.detected_at >= since)
            .filter(|row| reviewed.is_none_or(|flag| row.reviewed == flag))
            .cloned()
            .collect())
    }

    async fn mark_reviewed(
        &self,
        change_id: Uuid,
        reviewed_by: &str,
        reviewed_at: DateTime<Utc>,
    ) -> AppResult<Change> {
        let mut rows = self.rows.lock().await;
        let Some(row) = rows.iter_mut().find(|row| row.id == change_id) else {
            return Err(AppError::NotFound(format!(
                "change '{change_id}' not found"
            )));
        };
        if row.reviewed {
            return Err(AppError::Conflict(format!(
                "change '{change_id}' is already reviewed"
            )));
        }

        row.reviewed = true;
        row.reviewed_by = Some(reviewed_by.to_owned());
        row.reviewed_at = Some(reviewed_at);
        Ok(row.clone())
    }

    async fn count_for_baseline(&self, baseline_id: Uuid) -> AppResult<i64> {
        let count = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|row| row.baseline_id == baseline_id)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

#[derive(Default)]
struct FakeDetectionRunRepository {
    runs: Mutex<Vec<DetectionRun>>,
}

#[async_trait]
impl DetectionRunRepository for FakeDetectionRunRepository {
    async fn try_begin_run(
        &self,
        resource_id: &ResourceId,
        started_at: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> AppResult<Option<Uuid>> {
        let mut runs = self.runs.lock().await;
        for run in runs.iter_mut() {
            if run.resource_id == *resource_id
                && run.status == DetectionRunStatus::Running
                && run.started_at < stale_before
            {
                run.status = DetectionRunStatus::Failed;
                run.failure_kind = Some(CycleFailureKind::Timeout);
                run.failure_message = Some("reclaimed stale run".to_owned());
                run.finished_at = Some(started_at);
            }
        }

        if runs
            .iter()
            .any(|run| run.resource_id == *resource_id && run.status == DetectionRunStatus::Running)
        {
            return Ok(None);
        }

        let run = DetectionRun {
            id: Uuid::new_v4(),
            resource_id: resource_id.clone(),
            status: DetectionRunStatus::Running,
            started_at,
            finished_at: None,
            failure_kind: None,
            failure_message: None,
            new_change_count: 0,
        };
        let run_id = run.id;
        runs.push(run);
        Ok(Some(run_id))
    }

    async fn complete_run(
        &self,
        run_id: Uuid,
        finished_at: DateTime<Utc>,
        new_change_count: i64,
    ) -> AppResult<()> {
        let mut runs = self.runs.lock().await;
        let Some(run) = runs.iter_mut().find(|run| run.id == run_id) else {
            return Err(AppError::NotFound(format!("run '{run_id}' not found")));
        };
        run.status = DetectionRunStatus::Succeeded;
        run.finished_at = Some(finished_at);
        run.new_change_count = new_change_count;
        Ok(())
    }

    async fn fail_run(
        &self,
        run_id: Uuid,
        finished_at: DateTime<Utc>,
        failure_kind: CycleFailureKind,
        failure_message: &str,
    ) -> AppResult<()> {
        let mut runs = self.runs.lock().await;
        let Some(run) = runs.iter_mut().find(|run| run.id == run_id) else {
            return Err(AppError::NotFound(format!("run '{run_id}' not found")));
        };
        run.status = DetectionRunStatus::Failed;
        run.finished_at = Some(finished_at);
        run.failure_kind = Some(failure_kind);
        run.failure_message = Some(failure_message.to_owned());
        Ok(())
    }

    async fn mark_no_baseline(&self, run_id: Uuid, finished_at: DateTime<Utc>) -> AppResult<()> {
        let mut runs = self.runs.lock().await;
        let Some(run) = runs.iter_mut().find(|run| run.id == run_id) else {
            return Err(AppError::NotFound(format!("run '{run_id}' not found")));
        };
        run.status = DetectionRunStatus::NoBaseline;
        run.finished_at = Some(finished_at);
        Ok(())
    }

    async fn list_recent(
        &self,
        resource_id: Option<&ResourceId>,
        limit: usize,
    ) -> AppResult<Vec<DetectionRun>> {
        Ok(self
            .runs
            .lock()
            .await
            .iter()
            .filter(|run| resource_id.is_none_or(|resource_id| run.resource_id == *resource_id))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct FakePermissionSource {
    snapshot: Mutex<Option<Snapshot>>,
    unavailable: AtomicBool,
    delay: Mutex<Option<std::time::Duration>>,
    calls: AtomicUsize,
}

#[async_trait]
impl PermissionSource for FakePermissionSource {
    async fn fetch_snapshot(&self, resource_id: &ResourceId) -> AppResult<Snapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = *self.delay.lock().await {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::SourceUnavailable(format!(
                "simulated source outage for '{resource_id}'"
            )));
        }

        self.snapshot.lock().await.clone().ok_or_else(|| {
            AppError::SourceUnavailable(format!("no live state configured for '{resource_id}'"))
        })
    }
}

#[derive(Default)]
struct FakeComparisonCache {
    entries: Mutex<HashMap<String, Vec<GrantChange>>>,
    hits: AtomicUsize,
    stores: AtomicUsize,
}

#[async_trait]
impl ComparisonCache for FakeComparisonCache {
    async fn get_changes(&self, key: &str) -> AppResult<Option<Vec<GrantChange>>> {
        let hit = self.entries.lock().await.get(key).cloned();
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
        Ok(hit)
    }

    async fn set_changes(
        &self,
        key: &str,
        changes: Vec<GrantChange>,
        _ttl_seconds: u32,
    ) -> AppResult<()> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().await.insert(key.to_owned(), changes);
        Ok(())
    }
}

struct FixedClock {
    now: DateTime<Utc>,
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 13, 9, 30, 0)
        .single()
        .unwrap_or_default()
}

fn resource_id() -> ResourceId {
    ResourceId::new("sites/engineering").unwrap_or_else(|_| unreachable!("valid resource id"))
}

fn grant(path: &str, principal: &str, role: &str) -> Grant {
    Grant::new(GrantInput {
        resource_path: path.to_owned(),
        principal_id: principal.to_owned(),
        principal_kind: PrincipalKind::User,
        role: role.to_owned(),
        inherited: false,
    })
    .unwrap_or_else(|_| unreachable!("test grant input is valid"))
}

fn active_baseline(grants: Vec<Grant>) -> Baseline {
    Baseline::new(BaselineInput {
        id: Uuid::new_v4(),
        resource_id: resource_id(),
        name: "reference".to_owned(),
        snapshot: Snapshot::new(grants, fixed_now()),
        created_at: fixed_now(),
        created_by: None,
        is_active: true,
    })
    .unwrap_or_else(|_| unreachable!("test baseline input is valid"))
}

fn build_service(
    baselines: Arc<FakeBaselineRepository>,
    changes: Arc<FakeChangeRepository>,
    runs: Arc<FakeDetectionRunRepository>,
    source: Arc<FakePermissionSource>,
) -> DetectionService {
    DetectionService::new(
        baselines,
        changes,
        runs,
        source,
        Arc::new(FixedClock { now: fixed_now() }),
    )
}

#[tokio::test]
async fn detection_without_active_baseline_skips_the_source() {
    let runs = Arc::new(FakeDetectionRunRepository::default());
    let source = Arc::new(FakePermissionSource::default());
    let service = build_service(
        Arc::new(FakeBaselineRepository::default()),
        Arc::new(FakeChangeRepository::default()),
        runs.clone(),
        source.clone(),
    );

    let outcome = service.run_detection_now(&resource_id()).await;
    assert!(outcome.is_ok());
    assert!(matches!(
        outcome.unwrap_or_else(|_| unreachable!()),
        DetectionOutcome::NoActiveBaseline { .. }
    ));
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);

    let runs = runs.runs.lock().await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, DetectionRunStatus::NoBaseline);
}

#[tokio::test]
async fn detection_persists_a_modified_role() {
    let baselines = Arc::new(FakeBaselineRepository::default());
    *baselines.active.lock().await = Some(active_baseline(vec![grant(
        "/finance",
        "alice@corp.test",
        "Read",
    )]));
    let changes = Arc::new(FakeChangeRepository::default());
    let source = Arc::new(FakePermissionSource::default());
    *source.snapshot.lock().await = Some(Snapshot::new(
        vec![grant("/finance", "alice@corp.test", "Write")],
        fixed_now(),
    ));

    let service = build_service(
        baselines,
        changes.clone(),
        Arc::new(FakeDetectionRunRepository::default()),
        source,
    );

    let outcome = service.run_detection_now(&resource_id()).await;
    assert!(outcome.is_ok());
    assert!(matches!(
        outcome.unwrap_or_else(|_| unreachable!()),
        DetectionOutcome::Completed { new_changes: 1, .. }
    ));

    let rows = changes.rows.lock().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, ChangeKind::Modified);
    assert_eq!(rows[0].old_role.as_deref(), Some("Read"));
    assert_eq!(rows[0].new_role.as_deref(), Some("Write"));
}

#[tokio::test]
async fn detection_reports_removed_grants() {
    let baselines = Arc::new(FakeBaselineRepository::default());
    *baselines.active.lock().await = Some(active_baseline(vec![
        grant("/finance", "alice@corp.test", "Read"),
        grant("/finance/reports", "auditors", "Read"),
    ]));
    let changes = Arc::new(FakeChangeRepository::default());
    let source = Arc::new(FakePermissionSource::default());
    *source.snapshot.lock().await = Some(Snapshot::new(
        vec![grant("/finance", "alice@corp.test", "Read")],
        fixed_now(),
    ));

    let service = build_service(
        baselines,
        changes.clone(),
        Arc::new(FakeDetectionRunRepository::default()),
        source,
    );

    let outcome = service.run_detection_now(&resource_id()).await;
    assert!(outcome.is_ok());

    let rows = changes.rows.lock().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, ChangeKind::Removed);
    assert_eq!(rows[0].resource_path, "/finance/reports");
    assert_eq!(rows[0].old_role.as_deref(), Some("Read"));
    assert_eq!(rows[0].new_role, None);
}

#[tokio::test]
async fn an_unchanged_second_cycle_persists_nothing() {
    let baselines = Arc::new(FakeBaselineRepository::default());
    *baselines.active.lock().await = Some(active_baseline(vec![grant(
        "/finance",
        "alice@corp.test",
        "Read",
    )]));
    let changes = Arc::new(FakeChangeRepository::default());
    let source = Arc::new(FakePermissionSource::default());
    *source.snapshot.lock().await = Some(Snapshot::new(
        vec![grant("/finance", "alice@corp.test", "Write")],
        fixed_now(),
    ));

    let service = build_service(
        baselines,
        changes.clone(),
        Arc::new(FakeDetectionRunRepository::default()),
        source,
    );

    let first = service.run_detection_now(&resource_id()).await;
    assert!(matches!(
        first,
        Ok(DetectionOutcome::Completed { new_changes: 1, .. })
    ));

    let second = service.run_detection_now(&resource_id()).await;
    assert!(matches!(
        second,
        Ok(DetectionOutcome::Completed { new_changes: 0, .. })
    ));
    assert_eq!(changes.rows.lock().await.len(), 1);
}

#[tokio::test]
async fn overlapping_cycles_are_skipped() {
    let runs = Arc::new(FakeDetectionRunRepository::default());
    runs.runs.lock().await.push(DetectionRun {
        id: Uuid::new_v4(),
        resource_id: resource_id(),
        status: DetectionRunStatus::Running,
        started_at: fixed_now(),
        finished_at: None,
        failure_kind: None,
        failure_message: None,
        new_change_count: 0,
    });
    let source = Arc::new(FakePermissionSource::default());

    let service = build_service(
        Arc::new(FakeBaselineRepository::default()),
        Arc::new(FakeChangeRepository::default()),
        runs,
        source.clone(),
    );

    let outcome = service.run_detection_now(&resource_id()).await;
    assert!(matches!(outcome, Ok(DetectionOutcome::AlreadyRunning)));
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn a_stale_running_marker_is_reclaimed() {
    let runs = Arc::new(FakeDetectionRunRepository::default());
    runs.runs.lock().await.push(DetectionRun {
        id: Uuid::new_v4(),
        resource_id: resource_id(),
        status: DetectionRunStatus::Running,
        started_at: fixed_now() - Duration::hours(2),
        finished_at: None,
        failure_kind: None,
        failure_message: None,
        new_change_count: 0,
    });

    let service = build_service(
        Arc::new(FakeBaselineRepository::default()),
        Arc::new(FakeChangeRepository::default()),
        runs.clone(),
        Arc::new(FakePermissionSource::default()),
    );

    let outcome = service.run_detection_now(&resource_id()).await;
    assert!(matches!(
        outcome,
        Ok(DetectionOutcome::NoActiveBaseline { .. })
    ));

    let runs = runs.runs.lock().await;
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].status, DetectionRunStatus::Failed);
    assert_eq!(runs[0].failure_kind, Some(CycleFailureKind::Timeout));
}

#[tokio::test]
async fn source_outage_records_a_failed_run() {
    let baselines = Arc::new(FakeBaselineRepository::default());
    *baselines.active.lock().await = Some(active_baseline(Vec::new()));
    let changes = Arc::new(FakeChangeRepository::default());
    let runs = Arc::new(FakeDetectionRunRepository::default());
    let source = Arc::new(FakePermissionSource::default());
    source.unavailable.store(true, Ordering::SeqCst);

    let service = build_service(baselines, changes.clone(), runs.clone(), source);

    let outcome = service.run_detection_now(&resource_id()).await;
    assert!(matches!(
        outcome,
        Ok(DetectionOutcome::Failed {
            kind: CycleFailureKind::SourceUnavailable,
            ..
        })
    ));
    assert!(changes.rows.lock().await.is_empty());

    let runs = runs.runs.lock().await;
    assert_eq!(runs[0].status, DetectionRunStatus::Failed);
    assert_eq!(runs[0].failure_kind, Some(CycleFailureKind::SourceUnavailable));
}

#[tokio::test]
async fn comparison_results_are_reused_from_the_cache() {
    let baselines = Arc::new(FakeBaselineRepository::default());
    *baselines.active.lock().await = Some(active_baseline(vec![grant(
        "/finance",
        "alice@corp.test",
        "Read",
    )]));
    let source = Arc::new(FakePermissionSource::default());
    *source.snapshot.lock().await = Some(Snapshot::new(
        vec![grant("/finance", "alice@corp.test", "Write")],
        fixed_now(),
    ));
    let cache = Arc::new(FakeComparisonCache::default());

    let service = build_service(
        baselines,
        Arc::new(FakeChangeRepository::default()),
        Arc::new(FakeDetectionRunRepository::default()),
        source,
    )
    .with_comparison_cache(cache.clone(), 300);

    assert!(service.run_detection_now(&resource_id()).await.is_ok());
    assert_eq!(cache.stores.load(Ordering::SeqCst), 1);
    assert_eq!(cache.hits.load(Ordering::SeqCst), 0);

    assert!(service.run_detection_now(&resource_id()).await.is_ok());
    assert_eq!(cache.stores.load(Ordering::SeqCst), 1);
    assert_eq!(cache.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn a_cycle_exceeding_its_deadline_fails_with_timeout() {
    let baselines = Arc::new(FakeBaselineRepository::default());
    *baselines.active.lock().await = Some(active_baseline(Vec::new()));
    let runs = Arc::new(FakeDetectionRunRepository::default());
    let source = Arc::new(FakePermissionSource::default());
    *source.delay.lock().await = Some(std::time::Duration::from_millis(50));

    let service = build_service(
        baselines,
        Arc::new(FakeChangeRepository::default()),
        runs.clone(),
        source,
    )
    .with_cycle_timeout_seconds(0);

    let outcome = service.run_detection_now(&resource_id()).await;
    assert!(matches!(
        outcome,
        Ok(DetectionOutcome::Failed {
            kind: CycleFailureKind::Timeout,
            ..
        })
    ));

    let runs = runs.runs.lock().await;
    assert_eq!(runs[0].status, DetectionRunStatus::Failed);
    assert_eq!(runs[0].failure_kind, Some(CycleFailureKind::Timeout));
}

#[tokio::test]
async fn reviewed_drift_is_detected_again() {
    let baselines = Arc::new(FakeBaselineRepository::default());
    *baselines.active.lock().await = Some(active_baseline(vec![grant(
        "/finance",
        "alice@corp.test",
        "Read",
    )]));
    let changes = Arc::new(FakeChangeRepository::default());
    let source = Arc::new(FakePermissionSource::default());
    *source.snapshot.lock().await = Some(Snapshot::new(
        vec![grant("/finance", "alice@corp.test", "Write")],
        fixed_now(),
    ));

    let service = build_service(
        baselines,
        changes.clone(),
        Arc::new(FakeDetectionRunRepository::default()),
        source,
    );

    assert!(service.run_detection_now(&resource_id()).await.is_ok());
    let change_id = changes.rows.lock().await[0].id;

    let reviewed = service.mark_reviewed(change_id, "ops").await;
    assert!(reviewed.is_ok_and(|change| change.reviewed));

    let again = service.mark_reviewed(change_id, "ops").await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    let outcome = service.run_detection_now(&resource_id()).await;
    assert!(matches!(
        outcome,
        Ok(DetectionOutcome::Completed { new_changes: 1, .. })
    ));
}

#[tokio::test]
async fn recent_changes_respect_the_window() {
    let changes = Arc::new(FakeChangeRepository::default());
    changes.rows.lock().await.push(Change {
        id: Uuid::new_v4(),
        baseline_id: Uuid::new_v4(),
        detected_at: fixed_now() - Duration::days(30),
        kind: ChangeKind::Added,
        resource_path: "/archive".to_owned(),
        principal_id: "bob@corp.test".to_owned(),
        old_role: None,
        new_role: Some("Read".to_owned()),
        reviewed: false,
        reviewed_by: None,
        reviewed_at: None,
    });
    changes.rows.lock().await.push(Change {
        id: Uuid::new_v4(),
        baseline_id: Uuid::new_v4(),
        detected_at: fixed_now() - Duration::days(2),
        kind: ChangeKind::Added,
        resource_path: "/finance".to_owned(),
        principal_id: "alice@corp.test".to_owned(),
        old_role: None,
        new_role: Some("Read".to_owned()),
        reviewed: false,
        reviewed_by: None,
        reviewed_at: None,
    });

    let service = build_service(
        Arc::new(FakeBaselineRepository::default()),
        changes,
        Arc::new(FakeDetectionRunRepository::default()),
        Arc::new(FakePermissionSource::default()),
    );

    let recent = service.list_recent_changes(None, 7, None).await;
    assert!(recent.is_ok());
    let recent = recent.unwrap_or_default();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].resource_path, "/finance");

    assert!(service.list_recent_changes(None, 0, None).await.is_err());
}
