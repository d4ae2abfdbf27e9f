use chrono::{DateTime, Utc};

/// Time source port.
///
/// Every service that schedules, buckets, or backs off takes its notion of
/// "now" from this port so retry and period arithmetic stay testable with
/// fixed clocks.
pub trait Clock: Send + Sync {
    /// Returns the current UTC instant.
    fn now(&self) -> DateTime<Utc>;
}
