use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grantwatch_core::{AppError, AppResult, ResourceId};
use uuid::Uuid;

use crate::detection_ports::Change;

/// Delivery state of one queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEntryStatus {
    /// Waiting for a delivery attempt.
    Pending,
    /// Claimed by a dispatcher and being delivered.
    Sending,
    /// Delivered. Terminal.
    Sent,
    /// Delivery attempts exhausted. Terminal, never auto-retried.
    Failed,
}

impl QueueEntryStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            _ => Err(AppError::Validation(format!(
                "unknown queue entry status '{value}'"
            ))),
        }
    }
}

/// Persisted notification bundle awaiting or past delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationQueueEntry {
    /// Entry identifier.
    pub id: Uuid,
    /// Resource the bundled changes belong to.
    pub resource_id: ResourceId,
    /// Delivery address.
    pub recipient_address: String,
    /// Rendered subject line.
    pub subject: String,
    /// Rendered plain-text body.
    pub body: String,
    /// Delivery state.
    pub status: QueueEntryStatus,
    /// Delivery attempts made so far.
    pub attempts: i32,
    /// When the bundle was enqueued.
    pub created_at: DateTime<Utc>,
    /// Last status transition timestamp.
    pub updated_at: DateTime<Utc>,
    /// Earliest instant the next attempt may run.
    pub next_attempt_at: DateTime<Utc>,
    /// Delivery timestamp, set on success.
    pub sent_at: Option<DateTime<Utc>>,
    /// Most recent attempt failure.
    pub last_error: Option<String>,
    /// Number of changes claimed into the bundle.
    pub change_count: i64,
}

/// Insert payload for one new queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQueueEntry {
    /// Resource the bundled changes belong to.
    pub resource_id: ResourceId,
    /// Delivery address.
    pub recipient_address: String,
    /// Rendered subject line.
    pub subject: String,
    /// Rendered plain-text body.
    pub body: String,
    /// Enqueue timestamp.
    pub created_at: DateTime<Utc>,
    /// Earliest instant the first attempt may run.
    pub next_attempt_at: DateTime<Utc>,
}

/// Repository port for the notification queue and its bundling claims.
#[async_trait]
pub trait NotificationQueueRepository: Send + Sync {
    /// Lists one resource's changes not yet claimed for one recipient,
    /// optionally restricted to changes detected before a cutoff.
    async fn list_unclaimed_changes(
        &self,
        resource_id: &ResourceId,
        recipient_address: &str,
        detected_before: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Change>>;

    /// Inserts one `pending` entry and one claim row per bundled change in
    /// a single transaction. Returns the entry id.
    ///
    /// Claims are unique per change and recipient; a second claim for the
    /// same pair fails the whole transaction.
    async fn enqueue_bundle(&self, entry: NewQueueEntry, change_ids: &[Uuid])
    -> AppResult<Uuid>;

    /// Atomically flips due `pending` entries to `sending` and returns
    /// them.
    ///
    /// An entry is due when `next_attempt_at` is not after `now` and its
    /// attempts are below `max_attempts`.
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        max_attempts: u32,
    ) -> AppResult<Vec<NotificationQueueEntry>>;

    /// Marks one entry delivered.
    async fn mark_sent(&self, entry_id: Uuid, sent_at: DateTime<Utc>) -> AppResult<()>;

    /// Records a failed attempt and returns the entry to `pending` for a
    /// later retry.
    async fn mark_retry(
        &self,
        entry_id: Uuid,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
        last_error: &str,
    ) -> AppResult<()>;

    /// Records a failed attempt and parks the entry in terminal `failed`.
    async fn mark_failed(&self, entry_id: Uuid, attempts: i32, last_error: &str)
    -> AppResult<()>;

    /// Lists entries, newest first, optionally filtered by status.
    async fn list(
        &self,
        status: Option<QueueEntryStatus>,
        limit: usize,
    ) -> AppResult<Vec<NotificationQueueEntry>>;

    /// Returns entries stuck in `sending` since before `stale_before` to
    /// `pending`. Returns the number of released entries.
    async fn release_stale_sending(&self, stale_before: DateTime<Utc>) -> AppResult<u64>;
}
