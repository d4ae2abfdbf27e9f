use async_trait::async_trait;
use grantwatch_core::AppResult;

/// Port over the outbound mail channel.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Attempts delivery of one rendered message.
    async fn deliver(&self, recipient_address: &str, subject: &str, body: &str) -> AppResult<()>;
}
