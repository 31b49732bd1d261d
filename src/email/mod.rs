mod console_email_client;
mod smtp_email_client;

use crate::configuration::EmailClientSettings;
use crate::domain::SubscriberEmail;
use async_trait::async_trait;
pub use console_email_client::ConsoleEmailClient;
pub use smtp_email_client::SmtpEmailClient;
use std::sync::Arc;

#[async_trait]
pub trait EmailClient: Send + Sync {
    async fn send_email(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<(), anyhow::Error>;
}

/// SMTP when configured, the log otherwise.
pub fn build_email_client(
    settings: &EmailClientSettings,
) -> Result<Arc<dyn EmailClient>, anyhow::Error> {
    let sender = settings.sender().map_err(anyhow::Error::msg)?;
    match &settings.smtp {
        Some(smtp) => {
            let client =
                SmtpEmailClient::new(smtp, sender, &settings.sender_name, settings.timeout())?;
            tracing::info!(smtp_host = %smtp.host, "Sending emails through SMTP");
            Ok(Arc::new(client))
        }
        None => {
            tracing::warn!("No SMTP transport configured, emails will be written to the log");
            Ok(Arc::new(ConsoleEmailClient::new(sender)))
        }
    }
}
