//! Application services and ports.

#![forbid(unsafe_code)]

mod baseline_service;
mod clock;
mod detection_ports;
mod detection_service;
mod notification_ports;
mod notification_service;
mod schedule;

pub use baseline_service::BaselineService;
pub use clock::Clock;
pub use detection_ports::{
    BaselineRepository, BaselineSummary, Change, ChangeRepository, ComparisonCache,
    CycleFailureKind, DetectionRun, DetectionRunRepository, DetectionRunStatus, PermissionSource,
    comparison_cache_key,
};
pub use detection_service::{DetectionOutcome, DetectionService};
pub use notification_ports::{
    MailTransport, NewQueueEntry, NotificationQueueEntry, NotificationQueueRepository,
    QueueEntryStatus, RecipientRepository,
};
pub use notification_service::{DeliveryPolicy, DeliveryReport, NotificationService};
pub use schedule::DetectionSchedule;
