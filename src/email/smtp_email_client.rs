use crate::configuration::SmtpSettings;
use crate::domain::SubscriberEmail;
use crate::email::EmailClient;
use anyhow::Context;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use std::time::Duration;

/// Sends emails through an SMTP relay. The transport is built once and shared.
pub struct SmtpEmailClient {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpEmailClient {
    pub fn new(
        settings: &SmtpSettings,
        sender: SubscriberEmail,
        sender_name: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let builder = if settings.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
        }
        .context("Failed to configure the SMTP relay.")?;
        let transport = builder
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.expose_secret().clone(),
            ))
            .timeout(Some(timeout))
            .build();
        let sender = Mailbox::new(
            Some(sender_name.to_string()),
            sender
                .as_ref()
                .parse()
                .context("The sender email is not a valid address.")?,
        );
        Ok(Self { transport, sender })
    }
}

#[async_trait]
impl EmailClient for SmtpEmailClient {
    async fn send_email(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.sender.clone())
            .to(recipient
                .as_ref()
                .parse()
                .context("The recipient is not a valid address.")?)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(
                text_content.to_string(),
                html_content.to_string(),
            ))
            .context("Failed to build the email message.")?;

        let response = self
            .transport
            .send(message)
            .await
            .context("The SMTP server did not accept the email.")?;
        tracing::info!(
            to = %recipient,
            code = %response.code(),
            "Email handed over to the SMTP server"
        );
        Ok(())
    }
}
