//! Console mail transport for development. Logs messages to tracing output.

use async_trait::async_trait;
use grantwatch_application::MailTransport;
use grantwatch_core::AppResult;
use tracing::info;

/// Development mail transport that logs messages instead of sending them.
#[derive(Clone)]
pub struct ConsoleMailTransport;

impl ConsoleMailTransport {
    /// Creates a console mail transport.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleMailTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailTransport for ConsoleMailTransport {
    async fn deliver(&self, recipient_address: &str, subject: &str, body: &str) -> AppResult<()> {
        info!(
            to = recipient_address,
            subject = subject,
            "--- MAIL (console) ---\nTo: {}\nSubject: {}\n\n{}\n--- END MAIL ---",
            recipient_address,
            subject,
            body
        );

        Ok(())
    }
}
