//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod baseline;
mod comparison;
mod grant;
mod notification;
mod snapshot;

pub use baseline::{Baseline, BaselineInput};
pub use comparison::{ChangeKind, GrantChange, compare_snapshots};
pub use grant::{Grant, GrantInput, PrincipalKind};
pub use notification::{
    EmailAddress, NotificationFrequency, NotificationRecipient, PeriodPolicy, parse_week_start,
};
pub use snapshot::{Snapshot, SnapshotStatistics};
