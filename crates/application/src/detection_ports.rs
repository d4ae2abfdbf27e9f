//! Ports consumed by baseline management and change detection.

mod baselines;
mod cache;
mod changes;
mod runs;
mod source;

pub use baselines::{BaselineRepository, BaselineSummary};
pub use cache::{ComparisonCache, comparison_cache_key};
pub use changes::{Change, ChangeRepository};
pub use runs::{CycleFailureKind, DetectionRun, DetectionRunRepository, DetectionRunStatus};
pub use source::PermissionSource;
