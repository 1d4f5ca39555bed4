//! SMTP email transport using lettre.
//!
//! Connects with STARTTLS to the configured relay (Gmail by default) and
//! authenticates as the sender on every send.

use super::EmailTransport;
use crate::config::{EmailCredentials, SmtpSettings};
use crate::error::TransportError;
use crate::models::{Channel, OutgoingEmail, SendReceipt};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::{debug, error, info};

const OCTET_STREAM: &str = "application/octet-stream";

/// SMTP email transport.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    settings: SmtpSettings,
}

impl SmtpTransport {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    /// Build the STARTTLS transport authenticated as the sender.
    fn build_transport(
        &self,
        credentials: &EmailCredentials,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, TransportError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.host)
            .map_err(|e| TransportError::email(format!("Failed to create SMTP relay: {}", e)))?
            .port(self.settings.port)
            .credentials(Credentials::new(
                credentials.sender().to_string(),
                credentials.password().to_string(),
            ))
            .timeout(Some(self.settings.timeout))
            .build();

        Ok(transport)
    }

    /// Build a lettre Message, attaching the referenced local file if any.
    async fn build_message(email: &OutgoingEmail) -> Result<Message, TransportError> {
        let from: Mailbox = email
            .from
            .parse()
            .map_err(|e| TransportError::email(format!("Invalid from address: {}", e)))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| TransportError::email(format!("Invalid to address: {}", e)))?;

        let builder = Message::builder().from(from).to(to).subject(&email.subject);

        let message = match &email.attachment {
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(email.body.clone()),
            Some(attachment) => {
                let content = tokio::fs::read(&attachment.path).await.map_err(|e| {
                    TransportError::email(format!(
                        "Failed to read attachment {}: {}",
                        attachment.file_name, e
                    ))
                })?;
                let content_type = ContentType::parse(
                    attachment.content_type.as_deref().unwrap_or(OCTET_STREAM),
                )
                .or_else(|_| ContentType::parse(OCTET_STREAM))
                .map_err(|e| TransportError::email(format!("Invalid content type: {}", e)))?;

                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::plain(email.body.clone()))
                        .singlepart(
                            Attachment::new(attachment.file_name.clone())
                                .body(content, content_type),
                        ),
                )
            }
        }
        .map_err(|e| TransportError::email(format!("Failed to build email message: {}", e)))?;

        Ok(message)
    }
}

#[async_trait]
impl EmailTransport for SmtpTransport {
    async fn send(
        &self,
        credentials: &EmailCredentials,
        email: &OutgoingEmail,
    ) -> Result<SendReceipt, TransportError> {
        debug!(
            to = %email.to,
            subject = %email.subject,
            host = %self.settings.host,
            port = %self.settings.port,
            has_attachment = email.attachment.is_some(),
            "Sending email via SMTP"
        );

        let message = Self::build_message(email).await?;
        let message_id = message
            .headers()
            .get_raw("Message-ID")
            .map(|id| id.trim_matches(|c| c == '<' || c == '>').to_string());

        let response = self
            .build_transport(credentials)?
            .send(message)
            .await
            .map_err(|e| {
                error!(to = %email.to, error = %e, "Failed to send email via SMTP");
                TransportError::email(format!("SMTP send failed: {}", e))
            })?;

        // Fall back to the server's reply when the message carried no Message-ID
        let message_id = message_id
            .or_else(|| response.message().next().map(|s| s.to_string()))
            .unwrap_or_default();

        info!(to = %email.to, message_id = %message_id, "Email sent successfully via SMTP");

        Ok(SendReceipt::new(Channel::Email, &email.to, message_id))
    }

    fn name(&self) -> &'static str {
        "SMTP"
    }
}
