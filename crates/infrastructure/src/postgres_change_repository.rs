use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use grantwatch_application::{Change, ChangeRepository};
use grantwatch_core::{AppError, AppResult, ResourceId};
use grantwatch_domain::{ChangeKind, GrantChange};

/// PostgreSQL-backed repository for detected permission changes.
#[derive(Clone)]
pub struct PostgresChangeRepository {
    pool: PgPool,
}

impl PostgresChangeRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ChangeRow {
    id: Uuid,
    baseline_id: Uuid,
    detected_at: DateTime<Utc>,
    kind: String,
    resource_path: String,
    principal_id: String,
    old_role: Option<String>,
    new_role: Option<String>,
    reviewed: bool,
    reviewed_by: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
}

fn change_from_row(row: ChangeRow) -> AppResult<Change> {
    Ok(Change {
        id: row.id,
        baseline_id: row.baseline_id,
        detected_at: row.detected_at,
        kind: row.kind.parse::<ChangeKind>()?,
        resource_path: row.resource_path,
        principal_id: row.principal_id,
        old_role: row.old_role,
        new_role: row.new_role,
        reviewed: row.reviewed,
        reviewed_by: row.reviewed_by,
        reviewed_at: row.reviewed_at,
    })
}

#[async_trait]
impl ChangeRepository for PostgresChangeRepository {
    async fn insert_new_changes(
        &self,
        baseline_id: Uuid,
        detected_at: DateTime<Utc>,
        changes: &[GrantChange],
    ) -> AppResult<Vec<Change>> {
        if changes.is_empty() {
            return Ok(Vec::new());
        }

        let candidates: Vec<serde_json::Value> = changes
            .iter()
            .map(|change| {
                serde_json::json!({
                    "kind": change.kind().as_str(),
                    "resource_path": change.resource_path(),
                    "principal_id": change.principal_id(),
                    "old_role": change.old_role(),
                    "new_role": change.new_role(),
                })
            })
            .collect();

        // Single statement keeps the dedup probe and the insert atomic under
        // concurrent cycles for the same baseline.
        let rows = sqlx::query_as::<_, ChangeRow>(
            r#"
            INSERT INTO permission_changes (
                id,
                baseline_id,
                resource_id,
                detected_at,
                kind,
                resource_path,
                principal_id,
                old_role,
                new_role
            )
            SELECT
                gen_random_uuid(),
                baselines.id,
                baselines.resource_id,
                $2,
                candidate.kind,
                candidate.resource_path,
                candidate.principal_id,
                candidate.old_role,
                candidate.new_role
            FROM permission_baselines baselines,
                 jsonb_to_recordset($3::JSONB) AS candidate(
                     kind TEXT,
                     resource_path TEXT,
                     principal_id TEXT,
                     old_role TEXT,
                     new_role TEXT
                 )
            WHERE baselines.id = $1
              AND NOT EXISTS (
                  SELECT 1
                  FROM permission_changes existing
                  WHERE existing.baseline_id = baselines.id
                    AND existing.resource_path = candidate.resource_path
                    AND existing.principal_id = candidate.principal_id
                    AND existing.kind = candidate.kind
                    AND NOT existing.reviewed
              )
            RETURNING
                id,
                baseline_id,
                detected_at,
                kind,
                resource_path,
                principal_id,
                old_role,
                new_role,
                reviewed,
                reviewed_by,
                reviewed_at
            "#,
        )
        .bind(baseline_id)
        .bind(detected_at)
        .bind(serde_json::Value::Array(candidates))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to insert changes for baseline '{baseline_id}': {error}"
            ))
        })?;

        rows.into_iter().map(change_from_row).collect()
    }

    async fn list_for_baseline(
        &self,
        baseline_id: Uuid,
        reviewed: Option<bool>,
        limit: usize,
    ) -> AppResult<Vec<Change>> {
        let capped_limit = limit.clamp(1, 1_000) as i64;
        let rows = sqlx::query_as::<_, ChangeRow>(
            r#"
            SELECT
                id,
                baseline_id,
                detected_at,
                kind,
                resource_path,
                principal_id,
                old_role,
                new_role,
                reviewed,
                reviewed_by,
                reviewed_at
            FROM permission_changes
            WHERE baseline_id = $1
              AND ($2::BOOLEAN IS NULL OR reviewed = $2)
            ORDER BY detected_at DESC, resource_path ASC, principal_id ASC
            LIMIT $3
            "#,
        )
        .bind(baseline_id)
        .bind(reviewed)
        .bind(capped_limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to list changes for baseline '{baseline_id}': {error}"
            ))
        })?;

        rows.into_iter().map(change_from_row).collect()
    }

    async fn list_recent(
        &self,
        resource_id: Option<&ResourceId>,
        since: DateTime<Utc>,
        reviewed: Option<bool>,
    ) -> AppResult<Vec<Change>> {
        let rows = sqlx::query_as::<_, ChangeRow>(
            r#"
            SELECT
                id,
                baseline_id,
                detected_at,
                kind,
                resource_path,
                principal_id,
                old_role,
                new_role,
                reviewed,
                reviewed_by,
                reviewed_at
            FROM permission_changes
            WHERE ($1::TEXT IS NULL OR resource_id = $1)
              AND detected_at >= $2
              AND ($3::BOOLEAN IS NULL OR reviewed = $3)
            ORDER BY detected_at DESC, resource_path ASC, principal_id ASC
            "#,
        )
        .bind(resource_id.map(ResourceId::as_str))
        .bind(since)
        .bind(reviewed)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to list recent changes: {error}")))?;

        rows.into_iter().map(change_from_row).collect()
    }

    async fn mark_reviewed(
        &self,
        change_id: Uuid,
        reviewed_by: &str,
        reviewed_at: DateTime<Utc>,
    ) -> AppResult<Change> {
        let updated = sqlx::query_as::<_, ChangeRow>(
            r#"
            UPDATE permission_changes
            SET reviewed = TRUE,
                reviewed_by = $2,
                reviewed_at = $3
            WHERE id = $1
              AND NOT reviewed
            RETURNING
                id,
                baseline_id,
                detected_at,
                kind,
                resource_path,
                principal_id,
                old_role,
                new_role,
                reviewed,
                reviewed_by,
                reviewed_at
            "#,
        )
        .bind(change_id)
        .bind(reviewed_by)
        .bind(reviewed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to mark change '{change_id}' reviewed: {error}"
            ))
        })?;

        if let Some(row) = updated {
            return change_from_row(row);
        }

        let already_reviewed =
            sqlx::query_scalar::<_, bool>("SELECT reviewed FROM permission_changes WHERE id = $1")
                .bind(change_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|error| {
                    AppError::Store(format!("failed to load change '{change_id}': {error}"))
                })?;

        match already_reviewed {
            Some(_) => Err(AppError::Conflict(format!(
                "change '{change_id}' is already reviewed"
            ))),
            None => Err(AppError::NotFound(format!("change '{change_id}' not found"))),
        }
    }

    async fn count_for_baseline(&self, baseline_id: Uuid) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM permission_changes WHERE baseline_id = $1",
        )
        .bind(baseline_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to count changes for baseline '{baseline_id}': {error}"
            ))
        })
    }
}
