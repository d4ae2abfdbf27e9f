use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use grantwatch_application::RecipientRepository;
use grantwatch_core::{AppError, AppResult, ResourceId};
use grantwatch_domain::{EmailAddress, NotificationRecipient};

/// PostgreSQL-backed repository for notification subscriptions.
#[derive(Clone)]
pub struct PostgresRecipientRepository {
    pool: PgPool,
}

impl PostgresRecipientRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RecipientRow {
    resource_id: String,
    address: String,
    frequency: String,
}

fn recipient_from_row(row: RecipientRow) -> AppResult<NotificationRecipient> {
    Ok(NotificationRecipient::new(
        ResourceId::new(row.resource_id)?,
        EmailAddress::new(row.address)?,
        row.frequency.parse()?,
    ))
}

#[async_trait]
impl RecipientRepository for PostgresRecipientRepository {
    async fn upsert(&self, recipient: NotificationRecipient) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_recipients (resource_id, address, frequency, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (resource_id, address)
            DO UPDATE SET
                frequency = EXCLUDED.frequency,
                updated_at = now()
            "#,
        )
        .bind(recipient.resource_id().as_str())
        .bind(recipient.address().as_str())
        .bind(recipient.frequency().as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to upsert recipient '{}' for '{}': {error}",
                recipient.address().as_str(),
                recipient.resource_id()
            ))
        })?;

        Ok(())
    }

    async fn remove(&self, resource_id: &ResourceId, address: &EmailAddress) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM notification_recipients
            WHERE resource_id = $1
              AND address = $2
            "#,
        )
        .bind(resource_id.as_str())
        .bind(address.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to remove recipient '{}' for '{resource_id}': {error}",
                address.as_str()
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "no subscription for '{}' on '{resource_id}'",
                address.as_str()
            )));
        }

        Ok(())
    }

    async fn list_for_resource(
        &self,
        resource_id: &ResourceId,
    ) -> AppResult<Vec<NotificationRecipient>> {
        let rows = sqlx::query_as::<_, RecipientRow>(
            r#"
            SELECT resource_id, address, frequency
            FROM notification_recipients
            WHERE resource_id = $1
            ORDER BY address ASC
            "#,
        )
        .bind(resource_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to list recipients for '{resource_id}': {error}"
            ))
        })?;

        rows.into_iter().map(recipient_from_row).collect()
    }

    async fn list_all(&self) -> AppResult<Vec<NotificationRecipient>> {
        let rows = sqlx::query_as::<_, RecipientRow>(
            r#"
            SELECT resource_id, address, frequency
            FROM notification_recipients
            ORDER BY resource_id ASC, address ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to list recipients: {error}")))?;

        rows.into_iter().map(recipient_from_row).collect()
    }
}
