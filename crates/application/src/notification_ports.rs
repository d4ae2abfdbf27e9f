//! Ports consumed by notification bundling and delivery.

mod queue;
mod recipients;
mod transport;

pub use queue::{
    NewQueueEntry, NotificationQueueEntry, NotificationQueueRepository, QueueEntryStatus,
};
pub use recipients::RecipientRepository;
pub use transport::MailTransport;
