use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use grantwatch_application::{
    CycleFailureKind, DetectionRun, DetectionRunRepository, DetectionRunStatus,
};
use grantwatch_core::{AppError, AppResult, ResourceId};

/// PostgreSQL-backed repository for detection run records.
///
/// A partial unique index on `running` rows makes the run row itself the
/// per-resource in-flight marker, so mutual exclusion holds across worker
/// processes.
#[derive(Clone)]
pub struct PostgresDetectionRunRepository {
    pool: PgPool,
}

impl PostgresDetectionRunRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct DetectionRunRow {
    id: Uuid,
    resource_id: String,
    status: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    failure_kind: Option<String>,
    failure_message: Option<String>,
    new_change_count: i64,
}

fn run_from_row(row: DetectionRunRow) -> AppResult<DetectionRun> {
    Ok(DetectionRun {
        id: row.id,
        resource_id: ResourceId::new(row.resource_id)?,
        status: DetectionRunStatus::parse(row.status.as_str())?,
        started_at: row.started_at,
        finished_at: row.finished_at,
        failure_kind: row
            .failure_kind
            .as_deref()
            .map(CycleFailureKind::parse)
            .transpose()?,
        failure_message: row.failure_message,
        new_change_count: row.new_change_count,
    })
}

#[async_trait]
impl DetectionRunRepository for PostgresDetectionRunRepository {
    async fn try_begin_run(
        &self,
        resource_id: &ResourceId,
        started_at: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> AppResult<Option<Uuid>> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Store(format!(
                "failed to start detection run claim transaction: {error}"
            ))
        })?;

        sqlx::query(
            r#"
            UPDATE detection_runs
            SET status = 'failed',
                finished_at = $2,
                failure_kind = 'timeout',
                failure_message = 'run reclaimed after exceeding the stale threshold'
            WHERE resource_id = $1
              AND status = 'running'
              AND started_at < $3
            "#,
        )
        .bind(resource_id.as_str())
        .bind(started_at)
        .bind(stale_before)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to reclaim stale detection run for '{resource_id}': {error}"
            ))
        })?;

        let claimed = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO detection_runs (id, resource_id, status, started_at)
            VALUES ($1, $2, 'running', $3)
            ON CONFLICT (resource_id) WHERE status = 'running' DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resource_id.as_str())
        .bind(started_at)
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to claim detection run for '{resource_id}': {error}"
            ))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Store(format!(
                "failed to commit detection run claim transaction: {error}"
            ))
        })?;

        Ok(claimed)
    }

    async fn complete_run(
        &self,
        run_id: Uuid,
        finished_at: DateTime<Utc>,
        new_change_count: i64,
    ) -> AppResult<()> {
        // A run reclaimed as stale no longer matches; its late completion is
        // a no-op.
        sqlx::query(
            r#"
            UPDATE detection_runs
            SET status = 'succeeded',
                finished_at = $2,
                new_change_count = $3
            WHERE id = $1
              AND status = 'running'
            "#,
        )
        .bind(run_id)
        .bind(finished_at)
        .bind(new_change_count)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!("failed to complete detection run '{run_id}': {error}"))
        })?;

        Ok(())
    }

    async fn fail_run(
        &self,
        run_id: Uuid,
        finished_at: DateTime<Utc>,
        failure_kind: CycleFailureKind,
        failure_message: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE detection_runs
            SET status = 'failed',
                finished_at = $2,
                failure_kind = $3,
                failure_message = $4
            WHERE id = $1
              AND status = 'running'
            "#,
        )
        .bind(run_id)
        .bind(finished_at)
        .bind(failure_kind.as_str())
        .bind(failure_message)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!("failed to fail detection run '{run_id}': {error}"))
        })?;

        Ok(())
    }

    async fn mark_no_baseline(&self, run_id: Uuid, finished_at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE detection_runs
            SET status = 'no_baseline',
                finished_at = $2
            WHERE id = $1
              AND status = 'running'
            "#,
        )
        .bind(run_id)
        .bind(finished_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to mark detection run '{run_id}' as no-baseline: {error}"
            ))
        })?;

        Ok(())
    }

    async fn list_recent(
        &self,
        resource_id: Option<&ResourceId>,
        limit: usize,
    ) -> AppResult<Vec<DetectionRun>> {
        let capped_limit = limit.clamp(1, 1_000) as i64;
        let rows = sqlx::query_as::<_, DetectionRunRow>(
            r#"
            SELECT
                id,
                resource_id,
                status,
                started_at,
                finished_at,
                failure_kind,
                failure_message,
                new_change_count
            FROM detection_runs
            WHERE ($1::TEXT IS NULL OR resource_id = $1)
            ORDER BY started_at DESC
            LIMIT $2
            "#,
        )
        .bind(resource_id.map(ResourceId::as_str))
        .bind(capped_limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to list detection runs: {error}")))?;

        rows.into_iter().map(run_from_row).collect()
    }
}
