use super::*;

impl NotificationService {
    /// Delivers due queue entries, retrying failures with bounded backoff.
    ///
    /// Entries are claimed by flipping them to `sending`, so concurrent
    /// dispatchers never deliver the same entry twice. A failed attempt
    /// returns the entry to `pending` with a `base * 2^attempts` delay,
    /// capped; reaching the attempt limit parks it in terminal `failed`.
    pub async fn process_queue(&self, limit: usize) -> AppResult<DeliveryReport> {
        if limit == 0 {
            return Err(AppError::Validation(
                "limit must be greater than zero".to_owned(),
            ));
        }

        let now = self.clock.now();
        let due = self
            .queue
            .claim_due(now, limit, self.delivery_policy.max_attempts)
            .await?;
        let mut report = DeliveryReport::default();

        for entry in due {
            match self.attempt_delivery(&entry).await {
                Ok(()) => {
                    self.queue.mark_sent(entry.id, self.clock.now()).await?;
                    report.delivered += 1;
                }
                Err(error) => {
                    let attempts = entry.attempts.saturating_add(1);
                    let error_message = error.to_string();
                    if i64::from(attempts) >= i64::from(self.delivery_policy.max_attempts) {
                        self.queue
                            .mark_failed(entry.id, attempts, error_message.as_str())
                            .await?;
                        report.failed += 1;
                    } else {
                        let delay = self.backoff_delay(entry.attempts);
                        self.queue
                            .mark_retry(
                                entry.id,
                                attempts,
                                self.clock.now() + delay,
                                error_message.as_str(),
                            )
                            .await?;
                        report.retried += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    async fn attempt_delivery(&self, entry: &NotificationQueueEntry) -> AppResult<()> {
        let deadline = std::time::Duration::from_secs(u64::from(
            self.delivery_policy.attempt_timeout_seconds,
        ));
        let attempt = self.transport.deliver(
            entry.recipient_address.as_str(),
            entry.subject.as_str(),
            entry.body.as_str(),
        );
        match tokio::time::timeout(deadline, attempt).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(format!(
                "delivery of queue entry '{}' exceeded {}s",
                entry.id, self.delivery_policy.attempt_timeout_seconds
            ))),
        }
    }

    fn backoff_delay(&self, completed_attempts: i32) -> Duration {
        let exponent = u32::try_from(completed_attempts).unwrap_or(0).min(31);
        let seconds = u64::from(self.delivery_policy.backoff_base_seconds)
            .saturating_mul(1_u64 << exponent)
            .min(u64::from(self.delivery_policy.backoff_cap_seconds));
        Duration::seconds(i64::try_from(seconds).unwrap_or(i64::MAX))
    }
}
