use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use grantwatch_application::{
    Change, NewQueueEntry, NotificationQueueEntry, NotificationQueueRepository, QueueEntryStatus,
};
use grantwatch_core::{AppError, AppResult, ResourceId};
use grantwatch_domain::ChangeKind;

/// PostgreSQL-backed notification queue.
///
/// Bundling claims live in `notification_queue_changes`; the unique
/// `(change_id, recipient_address)` constraint there is what makes each
/// change enter at most one bundle per recipient.
#[derive(Clone)]
pub struct PostgresNotificationQueueRepository {
    pool: PgPool,
}

impl PostgresNotificationQueueRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct QueueEntryRow {
    id: Uuid,
    resource_id: String,
    recipient_address: String,
    subject: String,
    body: String,
    status: String,
    attempts: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    next_attempt_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    change_count: i64,
}

fn entry_from_row(row: QueueEntryRow) -> AppResult<NotificationQueueEntry> {
    Ok(NotificationQueueEntry {
        id: row.id,
        resource_id: ResourceId::new(row.resource_id)?,
        recipient_address: row.recipient_address,
        subject: row.subject,
        body: row.body,
        status: QueueEntryStatus::parse(row.status.as_str())?,
        attempts: row.attempts,
        created_at: row.created_at,
        updated_at: row.updated_at,
        next_attempt_at: row.next_attempt_at,
        sent_at: row.sent_at,
        last_error: row.last_error,
        change_count: row.change_count,
    })
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
impl NotificationQueueRepository for PostgresNotificationQueueRepository {
    async fn list_unclaimed_changes(
        &self,
        resource_id: &ResourceId,
        recipient_address: &str,
        detected_before: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Change>> {
        let rows = sqlx::query_as::<_, ChangeRow>(
            r#"
            SELECT
                changes.id,
                changes.baseline_id,
                changes.detected_at,
                changes.kind,
                changes.resource_path,
                changes.principal_id,
                changes.old_role,
                changes.new_role,
                changes.reviewed,
                changes.reviewed_by,
                changes.reviewed_at
            FROM permission_changes changes
            WHERE changes.resource_id = $1
              AND NOT EXISTS (
                  SELECT 1
                  FROM notification_queue_changes links
                  WHERE links.change_id = changes.id
                    AND links.recipient_address = $2
              )
              AND ($3::TIMESTAMPTZ IS NULL OR changes.detected_at < $3)
            ORDER BY changes.detected_at ASC, changes.resource_path ASC, changes.principal_id ASC
            "#,
        )
        .bind(resource_id.as_str())
        .bind(recipient_address)
        .bind(detected_before)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to list unclaimed changes for '{resource_id}': {error}"
            ))
        })?;

        rows.into_iter().map(change_from_row).collect()
    }

    async fn enqueue_bundle(
        &self,
        entry: NewQueueEntry,
        change_ids: &[Uuid],
    ) -> AppResult<Uuid> {
        let entry_id = Uuid::new_v4();

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Store(format!("failed to begin bundle transaction: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO notification_queue (
                id,
                resource_id,
                recipient_address,
                subject,
                body,
                status,
                attempts,
                created_at,
                updated_at,
                next_attempt_at,
                change_count
            )
            VALUES ($1, $2, $3, $4, $5, 'pending', 0, $6, $6, $7, $8)
            "#,
        )
        .bind(entry_id)
        .bind(entry.resource_id.as_str())
        .bind(entry.recipient_address.as_str())
        .bind(entry.subject)
        .bind(entry.body)
        .bind(entry.created_at)
        .bind(entry.next_attempt_at)
        .bind(change_ids.len() as i64)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to enqueue bundle for '{}': {error}",
                entry.recipient_address
            ))
        })?;

        sqlx::query(
            r#"
            INSERT INTO notification_queue_changes (queue_entry_id, change_id, recipient_address)
            SELECT $1, change_id, $2
            FROM UNNEST($3::UUID[]) AS change_id
            "#,
        )
        .bind(entry_id)
        .bind(entry.recipient_address.as_str())
        .bind(change_ids)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            let already_claimed = error.as_database_error().is_some_and(|database_error| {
                database_error.is_unique_violation()
                    && database_error.constraint()
                        == Some("notification_queue_changes_claim_key")
            });
            if already_claimed {
                AppError::Conflict(format!(
                    "a bundled change is already claimed for '{}'",
                    entry.recipient_address
                ))
            } else {
                AppError::Store(format!(
                    "failed to claim changes for '{}': {error}",
                    entry.recipient_address
                ))
            }
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Store(format!("failed to commit bundle transaction: {error}"))
        })?;

        Ok(entry_id)
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        max_attempts: u32,
    ) -> AppResult<Vec<NotificationQueueEntry>> {
        let limit = limit.clamp(1, 100) as i64;

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Store(format!("failed to begin claim transaction: {error}"))
        })?;

        let rows = sqlx::query_as::<_, QueueEntryRow>(
            r#"
            WITH due_entries AS (
                SELECT id
                FROM notification_queue
                WHERE status = 'pending'
                  AND next_attempt_at <= $1
                  AND attempts < $3
                ORDER BY next_attempt_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE notification_queue AS queue
            SET status = 'sending',
                updated_at = $1
            FROM due_entries
            WHERE queue.id = due_entries.id
            RETURNING
                queue.id,
                queue.resource_id,
                queue.recipient_address,
                queue.subject,
                queue.body,
                queue.status,
                queue.attempts,
                queue.created_at,
                queue.updated_at,
                queue.next_attempt_at,
                queue.sent_at,
                queue.last_error,
                queue.change_count
            "#,
        )
        .bind(now)
        .bind(limit)
        .bind(i64::from(max_attempts))
        .fetch_all(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Store(format!("failed to claim due queue entries: {error}"))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Store(format!("failed to commit claim transaction: {error}"))
        })?;

        rows.into_iter().map(entry_from_row).collect()
    }

    async fn mark_sent(&self, entry_id: Uuid, sent_at: DateTime<Utc>) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE notification_queue
            SET status = 'sent',
                sent_at = $2,
                updated_at = $2,
                last_error = NULL
            WHERE id = $1
            "#,
        )
        .bind(entry_id)
        .bind(sent_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!("failed to mark entry '{entry_id}' sent: {error}"))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "queue entry '{entry_id}' not found"
            )));
        }

        Ok(())
    }

    async fn mark_retry(
        &self,
        entry_id: Uuid,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
        last_error: &str,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE notification_queue
            SET status = 'pending',
                attempts = $2,
                next_attempt_at = $3,
                last_error = $4,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(entry_id)
        .bind(attempts)
        .bind(next_attempt_at)
        .bind(last_error)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to schedule retry for entry '{entry_id}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "queue entry '{entry_id}' not found"
            )));
        }

        Ok(())
    }

    async fn mark_failed(
        &self,
        entry_id: Uuid,
        attempts: i32,
        last_error: &str,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE notification_queue
            SET status = 'failed',
                attempts = $2,
                last_error = $3,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(entry_id)
        .bind(attempts)
        .bind(last_error)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!("failed to mark entry '{entry_id}' failed: {error}"))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "queue entry '{entry_id}' not found"
            )));
        }

        Ok(())
    }

    async fn list(
        &self,
        status: Option<QueueEntryStatus>,
        limit: usize,
    ) -> AppResult<Vec<NotificationQueueEntry>> {
        let limit = limit.clamp(1, 500) as i64;

        let rows = sqlx::query_as::<_, QueueEntryRow>(
            r#"
            SELECT
                id,
                resource_id,
                recipient_address,
                subject,
                body,
                status,
                attempts,
                created_at,
                updated_at,
                next_attempt_at,
                sent_at,
                last_error,
                change_count
            FROM notification_queue
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(status.map(|status| status.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to list queue entries: {error}")))?;

        rows.into_iter().map(entry_from_row).collect()
    }

    async fn release_stale_sending(&self, stale_before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notification_queue
            SET status = 'pending',
                updated_at = now()
            WHERE status = 'sending'
              AND updated_at < $1
            "#,
        )
        .bind(stale_before)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!("failed to release stale sending entries: {error}"))
        })?;

        Ok(result.rows_affected())
    }
}
