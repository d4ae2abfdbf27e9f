//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod console_mail_transport;
mod http_permission_source;
mod in_memory_comparison_cache;
mod postgres_baseline_repository;
mod postgres_change_repository;
mod postgres_detection_run_repository;
mod postgres_notification_queue_repository;
mod postgres_recipient_repository;
mod smtp_mail_transport;
mod system_clock;

pub use console_mail_transport::ConsoleMailTransport;
pub use http_permission_source::HttpPermissionSource;
pub use in_memory_comparison_cache::InMemoryComparisonCache;
pub use postgres_baseline_repository::PostgresBaselineRepository;
pub use postgres_change_repository::PostgresChangeRepository;
pub use postgres_detection_run_repository::PostgresDetectionRunRepository;
pub use postgres_notification_queue_repository::PostgresNotificationQueueRepository;
pub use postgres_recipient_repository::PostgresRecipientRepository;
pub use smtp_mail_transport::{SmtpMailConfig, SmtpMailTransport};
pub use system_clock::SystemClock;
