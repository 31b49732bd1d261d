use crate::domain::SubscriberEmail;
use crate::email::EmailClient;
use async_trait::async_trait;

/// Writes outgoing emails to the log instead of delivering them.
pub struct ConsoleEmailClient {
    sender: SubscriberEmail,
}

impl ConsoleEmailClient {
    pub fn new(sender: SubscriberEmail) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl EmailClient for ConsoleEmailClient {
    async fn send_email(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        _html_content: &str,
        text_content: &str,
    ) -> anyhow::Result<()> {
        tracing::info!(
            from = %self.sender,
            to = %recipient,
            subject,
            body = text_content,
            "Email not delivered, no transport is configured"
        );
        Ok(())
    }
}
