use std::sync::Arc;

use chrono::Duration;
use grantwatch_core::{AppError, AppResult, ResourceId};
use grantwatch_domain::{EmailAddress, NotificationFrequency, NotificationRecipient, PeriodPolicy};

use crate::clock::Clock;
use crate::notification_ports::{
    MailTransport, NotificationQueueEntry, NotificationQueueRepository, QueueEntryStatus,
    RecipientRepository,
};

/// Retry and timeout knobs for queue delivery.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryPolicy {
    /// Attempts before an entry parks in terminal `failed`.
    pub max_attempts: u32,
    /// Base delay for exponential backoff, in seconds.
    pub backoff_base_seconds: u32,
    /// Upper bound on one backoff delay, in seconds.
    pub backoff_cap_seconds: u32,
    /// Per-attempt delivery timeout, in seconds.
    pub attempt_timeout_seconds: u32,
    /// Age after which a `sending` entry counts as abandoned.
    pub stale_sending_seconds: u32,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_seconds: 60,
            backoff_cap_seconds: 3600,
            attempt_timeout_seconds: 30,
            stale_sending_seconds: 900,
        }
    }
}

/// Counters for one delivery tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Entries delivered and marked `sent`.
    pub delivered: usize,
    /// Entries returned to `pending` with a backoff delay.
    pub retried: usize,
    /// Entries parked in terminal `failed`.
    pub failed: usize,
}

/// Application service bundling detected changes into notifications and
/// delivering them.
pub struct NotificationService {
    recipients: Arc<dyn RecipientRepository>,
    queue: Arc<dyn NotificationQueueRepository>,
    transport: Arc<dyn MailTransport>,
    clock: Arc<dyn Clock>,
    period_policy: PeriodPolicy,
    delivery_policy: DeliveryPolicy,
}

impl NotificationService {
    /// Creates a new notification service.
    #[must_use]
    pub fn new(
        recipients: Arc<dyn RecipientRepository>,
        queue: Arc<dyn NotificationQueueRepository>,
        transport: Arc<dyn MailTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            recipients,
            queue,
            transport,
            clock,
            period_policy: PeriodPolicy::default(),
            delivery_policy: DeliveryPolicy::default(),
        }
    }

    /// Replaces the period boundary policy.
    #[must_use]
    pub fn with_period_policy(mut self, policy: PeriodPolicy) -> Self {
        self.period_policy = policy;
        self
    }

    /// Replaces the delivery policy.
    #[must_use]
    pub fn with_delivery_policy(mut self, policy: DeliveryPolicy) -> Self {
        self.delivery_policy = policy;
        self
    }

    /// Subscribes one address to one resource, replacing any previous
    /// frequency.
    pub async fn upsert_recipient(
        &self,
        resource_id: ResourceId,
        address: &str,
        frequency: NotificationFrequency,
    ) -> AppResult<NotificationRecipient> {
        let address = EmailAddress::new(address)?;
        let recipient = NotificationRecipient::new(resource_id, address, frequency);
        self.recipients.upsert(recipient.clone()).await?;
        Ok(recipient)
    }

    /// Removes one subscription.
    pub async fn remove_recipient(&self, resource_id: &ResourceId, address: &str) -> AppResult<()> {
        let address = EmailAddress::new(address)?;
        self.recipients.remove(resource_id, &address).await
    }

    /// Lists subscriptions for one resource.
    pub async fn list_recipients(
        &self,
        resource_id: &ResourceId,
    ) -> AppResult<Vec<NotificationRecipient>> {
        self.recipients.list_for_resource(resource_id).await
    }

    /// Lists queue entries, optionally filtered by status.
    pub async fn list_queue_entries(
        &self,
        status: Option<QueueEntryStatus>,
        limit: usize,
    ) -> AppResult<Vec<NotificationQueueEntry>> {
        if limit == 0 {
            return Err(AppError::Validation(
                "limit must be greater than zero".to_owned(),
            ));
        }

        self.queue.list(status, limit).await
    }

    /// Returns abandoned `sending` entries to `pending`.
    pub async fn release_stale_sending(&self) -> AppResult<u64> {
        let stale_before = self.clock.now()
            - Duration::seconds(i64::from(self.delivery_policy.stale_sending_seconds));
        self.queue.release_stale_sending(stale_before).await
    }
}

mod bundling;
mod delivery;
mod render;
