use grantwatch_domain::{Baseline, GrantChange, Snapshot, compare_snapshots};

use super::*;
use crate::detection_ports::comparison_cache_key;

enum CycleResult {
    NoBaseline,
    Completed { new_changes: usize },
}

impl DetectionService {
    /// Runs one detection cycle for one resource.
    ///
    /// Cycle-level failures never surface as errors; they are recorded on
    /// the run row and reported in the outcome. An `Err` from this method
    /// means the run record itself could not be written.
    pub async fn run_detection_now(
        &self,
        resource_id: &ResourceId,
    ) -> AppResult<DetectionOutcome> {
        let started_at = self.clock.now();
        let stale_before =
            started_at - Duration::seconds(i64::from(self.stale_run_threshold_seconds));
        let Some(run_id) = self
            .runs
            .try_begin_run(resource_id, started_at, stale_before)
            .await?
        else {
            return Ok(DetectionOutcome::AlreadyRunning);
        };

        let deadline = std::time::Duration::from_secs(self.cycle_timeout_seconds);
        match tokio::time::timeout(deadline, self.run_cycle(resource_id)).await {
            Ok(Ok(CycleResult::Completed { new_changes })) => {
                let new_change_count = i64::try_from(new_changes).unwrap_or(i64::MAX);
                self.runs
                    .complete_run(run_id, self.clock.now(), new_change_count)
                    .await?;
                Ok(DetectionOutcome::Completed {
                    run_id,
                    new_changes,
                })
            }
            Ok(Ok(CycleResult::NoBaseline)) => {
                self.runs.mark_no_baseline(run_id, self.clock.now()).await?;
                Ok(DetectionOutcome::NoActiveBaseline { run_id })
            }
            Ok(Err(error)) => {
                let kind = CycleFailureKind::from(&error);
                let message = error.to_string();
                self.runs
                    .fail_run(run_id, self.clock.now(), kind, message.as_str())
                    .await?;
                Ok(DetectionOutcome::Failed {
                    run_id,
                    kind,
                    message,
                })
            }
            Err(_) => {
                let message = format!(
                    "detection cycle exceeded {}s deadline",
                    self.cycle_timeout_seconds
                );
                self.runs
                    .fail_run(
                        run_id,
                        self.clock.now(),
                        CycleFailureKind::Timeout,
                        message.as_str(),
                    )
                    .await?;
                Ok(DetectionOutcome::Failed {
                    run_id,
                    kind: CycleFailureKind::Timeout,
                    message,
                })
            }
        }
    }

    async fn run_cycle(&self, resource_id: &ResourceId) -> AppResult<CycleResult> {
        let Some(baseline) = self.baselines.find_active(resource_id).await? else {
            return Ok(CycleResult::NoBaseline);
        };

        let live = self.source.fetch_snapshot(resource_id).await?;
        let changes = self.compare_with_cache(&baseline, &live).await?;
        let inserted = self
            .changes
            .insert_new_changes(baseline.id(), self.clock.now(), &changes)
            .await?;

        Ok(CycleResult::Completed {
            new_changes: inserted.len(),
        })
    }

    async fn compare_with_cache(
        &self,
        baseline: &Baseline,
        live: &Snapshot,
    ) -> AppResult<Vec<GrantChange>> {
        let key = comparison_cache_key(
            baseline.id(),
            baseline.snapshot().content_hash(),
            live.content_hash(),
        );

        if self.comparison_cache_ttl_seconds > 0
            && let Some(cache) = &self.comparison_cache
            && let Some(changes) = cache.get_changes(key.as_str()).await?
        {
            return Ok(changes);
        }

        let changes = compare_snapshots(baseline.snapshot(), live);

        if self.comparison_cache_ttl_seconds > 0
            && let Some(cache) = &self.comparison_cache
        {
            cache
                .set_changes(key.as_str(), changes.clone(), self.comparison_cache_ttl_seconds)
                .await?;
        }

        Ok(changes)
    }
}
