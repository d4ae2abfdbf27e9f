use async_trait::async_trait;
use grantwatch_core::{AppResult, ResourceId};
use grantwatch_domain::{EmailAddress, NotificationRecipient};

/// Repository port for notification subscriptions.
#[async_trait]
pub trait RecipientRepository: Send + Sync {
    /// Inserts or updates one subscription, keyed by resource and address.
    async fn upsert(&self, recipient: NotificationRecipient) -> AppResult<()>;

    /// Removes one subscription.
    ///
    /// Fails with `AppError::NotFound` when no such subscription exists.
    async fn remove(&self, resource_id: &ResourceId, address: &EmailAddress) -> AppResult<()>;

    /// Lists subscriptions for one resource.
    async fn list_for_resource(
        &self,
        resource_id: &ResourceId,
    ) -> AppResult<Vec<NotificationRecipient>>;

    /// Lists every subscription.
    async fn list_all(&self) -> AppResult<Vec<NotificationRecipient>>;
}
