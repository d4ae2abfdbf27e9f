use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use grantwatch_application::{BaselineRepository, BaselineSummary};
use grantwatch_core::{AppError, AppResult, ResourceId};
use grantwatch_domain::{Baseline, BaselineInput, Snapshot};

/// PostgreSQL-backed repository for permission baselines.
///
/// The snapshot payload is stored as one JSONB document per baseline; the
/// single-active-per-resource invariant is enforced by a partial unique
/// index and the transactional swap in [`BaselineRepository::activate`].
#[derive(Clone)]
pub struct PostgresBaselineRepository {
    pool: PgPool,
}

impl PostgresBaselineRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct BaselineRow {
    id: Uuid,
    resource_id: String,
    name: String,
    snapshot: serde_json::Value,
    created_at: DateTime<Utc>,
    created_by: Option<String>,
    is_active: bool,
}

fn baseline_from_row(row: BaselineRow) -> AppResult<Baseline> {
    let snapshot: Snapshot = serde_json::from_value(row.snapshot).map_err(|error| {
        AppError::Store(format!(
            "failed to decode stored snapshot for baseline '{}': {error}",
            row.id
        ))
    })?;

    Baseline::new(BaselineInput {
        id: row.id,
        resource_id: ResourceId::new(row.resource_id)?,
        name: row.name,
        snapshot,
        created_at: row.created_at,
        created_by: row.created_by,
        is_active: row.is_active,
    })
}

#[derive(Debug, FromRow)]
struct BaselineSummaryRow {
    id: Uuid,
    resource_id: String,
    name: String,
    created_at: DateTime<Utc>,
    created_by: Option<String>,
    is_active: bool,
    grant_count: i64,
}

#[async_trait]
impl BaselineRepository for PostgresBaselineRepository {
    async fn insert(&self, baseline: Baseline) -> AppResult<()> {
        let snapshot = serde_json::to_value(baseline.snapshot()).map_err(|error| {
            AppError::Store(format!(
                "failed to encode snapshot for baseline '{}': {error}",
                baseline.id()
            ))
        })?;
        let grant_count = baseline.snapshot().grants().len() as i64;

        sqlx::query(
            r#"
            INSERT INTO permission_baselines (
                id,
                resource_id,
                name,
                snapshot,
                grant_count,
                created_at,
                created_by,
                is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(baseline.id())
        .bind(baseline.resource_id().as_str())
        .bind(baseline.name().as_str())
        .bind(snapshot)
        .bind(grant_count)
        .bind(baseline.created_at())
        .bind(baseline.created_by())
        .bind(baseline.is_active())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            let duplicate_name = error.as_database_error().is_some_and(|database_error| {
                database_error.is_unique_violation()
                    && database_error.constraint() == Some("permission_baselines_resource_name_key")
            });
            if duplicate_name {
                AppError::DuplicateName(format!(
                    "baseline '{}' already exists for resource '{}'",
                    baseline.name().as_str(),
                    baseline.resource_id()
                ))
            } else {
                AppError::Store(format!(
                    "failed to insert baseline '{}': {error}",
                    baseline.id()
                ))
            }
        })?;

        Ok(())
    }

    async fn find(&self, baseline_id: Uuid) -> AppResult<Option<Baseline>> {
        let row = sqlx::query_as::<_, BaselineRow>(
            r#"
            SELECT id, resource_id, name, snapshot, created_at, created_by, is_active
            FROM permission_baselines
            WHERE id = $1
            "#,
        )
        .bind(baseline_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!("failed to load baseline '{baseline_id}': {error}"))
        })?;

        row.map(baseline_from_row).transpose()
    }

    async fn find_active(&self, resource_id: &ResourceId) -> AppResult<Option<Baseline>> {
        let row = sqlx::query_as::<_, BaselineRow>(
            r#"
            SELECT id, resource_id, name, snapshot, created_at, created_by, is_active
            FROM permission_baselines
            WHERE resource_id = $1
              AND is_active
            "#,
        )
        .bind(resource_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to load active baseline for '{resource_id}': {error}"
            ))
        })?;

        row.map(baseline_from_row).transpose()
    }

    async fn list(
        &self,
        resource_id: Option<&ResourceId>,
        include_inactive: bool,
    ) -> AppResult<Vec<BaselineSummary>> {
        let rows = sqlx::query_as::<_, BaselineSummaryRow>(
            r#"
            SELECT id, resource_id, name, created_at, created_by, is_active, grant_count
            FROM permission_baselines
            WHERE ($1::TEXT IS NULL OR resource_id = $1)
              AND ($2::BOOLEAN OR is_active)
            ORDER BY created_at DESC
            "#,
        )
        .bind(resource_id.map(ResourceId::as_str))
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to list baselines: {error}")))?;

        rows.into_iter()
            .map(|row| {
                Ok(BaselineSummary {
                    id: row.id,
                    resource_id: ResourceId::new(row.resource_id)?,
                    name: row.name,
                    created_at: row.created_at,
                    created_by: row.created_by,
                    is_active: row.is_active,
                    grant_count: row.grant_count,
                })
            })
            .collect()
    }

    async fn activate(&self, baseline_id: Uuid) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Store(format!(
                "failed to start baseline activation transaction: {error}"
            ))
        })?;

        sqlx::query(
            r#"
            UPDATE permission_baselines
            SET is_active = FALSE
            WHERE is_active
              AND id <> $1
              AND resource_id = (SELECT resource_id FROM permission_baselines WHERE id = $1)
            "#,
        )
        .bind(baseline_id)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to clear previously active baseline for '{baseline_id}': {error}"
            ))
        })?;

        let result = sqlx::query(
            r#"
            UPDATE permission_baselines
            SET is_active = TRUE
            WHERE id = $1
            "#,
        )
        .bind(baseline_id)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Store(format!("failed to activate baseline '{baseline_id}': {error}"))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "baseline '{baseline_id}' not found"
            )));
        }

        transaction.commit().await.map_err(|error| {
            AppError::Store(format!(
                "failed to commit baseline activation transaction: {error}"
            ))
        })?;

        Ok(())
    }

    async fn deactivate(&self, baseline_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE permission_baselines
            SET is_active = FALSE
            WHERE id = $1
            "#,
        )
        .bind(baseline_id)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to deactivate baseline '{baseline_id}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "baseline '{baseline_id}' not found"
            )));
        }

        Ok(())
    }

    async fn delete(&self, baseline_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM permission_baselines WHERE id = $1")
            .bind(baseline_id)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                let referenced = error
                    .as_database_error()
                    .is_some_and(sqlx::error::DatabaseError::is_foreign_key_violation);
                if referenced {
                    AppError::Conflict(format!(
                        "baseline '{baseline_id}' is referenced by detected changes"
                    ))
                } else {
                    AppError::Store(format!(
                        "failed to delete baseline '{baseline_id}': {error}"
                    ))
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "baseline '{baseline_id}' not found"
            )));
        }

        Ok(())
    }

    async fn list_monitored_resources(&self) -> AppResult<Vec<ResourceId>> {
        let resources = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT baselines.resource_id
            FROM permission_baselines baselines
            INNER JOIN notification_recipients recipients
                ON recipients.resource_id = baselines.resource_id
            WHERE baselines.is_active
            ORDER BY baselines.resource_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!("failed to list monitored resources: {error}"))
        })?;

        resources.into_iter().map(ResourceId::new).collect()
    }
}
