use uuid::Uuid;

use super::*;
use super::render::render_bundle;
use crate::notification_ports::NewQueueEntry;

impl NotificationService {
    /// Bundles unclaimed changes into queue entries, one per recipient.
    ///
    /// A claim row per bundled change makes the bundling decision one-time:
    /// a change is offered to a recipient exactly once, however many
    /// dispatcher ticks follow. Daily and weekly recipients only receive
    /// changes detected before their most recent period boundary.
    ///
    /// Returns the number of entries enqueued.
    pub async fn bundle_pending(&self) -> AppResult<usize> {
        let now = self.clock.now();
        let mut enqueued = 0;

        for recipient in self.recipients.list_all().await? {
            let cutoff = self.period_policy.cutoff_for(recipient.frequency(), now);
            let changes = self
                .queue
                .list_unclaimed_changes(
                    recipient.resource_id(),
                    recipient.address().as_str(),
                    cutoff,
                )
                .await?;
            if changes.is_empty() {
                continue;
            }

            let (subject, body) = render_bundle(recipient.resource_id(), &changes);
            let change_ids: Vec<Uuid> = changes.iter().map(|change| change.id).collect();
            let entry = NewQueueEntry {
                resource_id: recipient.resource_id().clone(),
                recipient_address: recipient.address().as_str().to_owned(),
                subject,
                body,
                created_at: now,
                next_attempt_at: now,
            };
            self.queue.enqueue_bundle(entry, &change_ids).await?;
            enqueued += 1;
        }

        Ok(enqueued)
    }
}
