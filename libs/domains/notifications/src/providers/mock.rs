//! Recording transports and a static media resolver for tests and dry runs.

use super::{EmailTransport, MessagingTransport};
use crate::config::{EmailCredentials, MessagingCredentials};
use crate::error::{MediaError, TransportError};
use crate::media::{MediaResolver, ResolvedMedia};
use crate::models::{Channel, OutgoingEmail, OutgoingMessage, SendReceipt};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// An email captured by [`RecordingEmailTransport`], with the attachment bytes
/// as they were on disk at send time.
#[derive(Debug, Clone)]
pub struct RecordedEmail {
    pub email: OutgoingEmail,
    pub attachment_contents: Option<Vec<u8>>,
}

/// Email transport that records instead of sending. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingEmailTransport {
    sent: Arc<Mutex<Vec<RecordedEmail>>>,
    failure_message: Option<String>,
}

impl RecordingEmailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that always fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub async fn sent_emails(&self) -> Vec<RecordedEmail> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn was_sent_to(&self, address: &str) -> bool {
        self.sent.lock().await.iter().any(|r| r.email.to == address)
    }
}

#[async_trait]
impl EmailTransport for RecordingEmailTransport {
    async fn send(
        &self,
        _credentials: &EmailCredentials,
        email: &OutgoingEmail,
    ) -> Result<SendReceipt, TransportError> {
        if let Some(message) = &self.failure_message {
            return Err(TransportError::email(message.clone()));
        }

        let attachment_contents = match &email.attachment {
            Some(attachment) => Some(tokio::fs::read(&attachment.path).await.map_err(|e| {
                TransportError::email(format!("attachment unreadable at send time: {}", e))
            })?),
            None => None,
        };

        let mut sent = self.sent.lock().await;
        sent.push(RecordedEmail {
            email: email.clone(),
            attachment_contents,
        });

        Ok(SendReceipt::new(
            Channel::Email,
            &email.to,
            format!("recorded-email-{}", sent.len()),
        ))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Messaging transport that records instead of sending. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingMessagingTransport {
    sent: Arc<Mutex<Vec<OutgoingMessage>>>,
    failure_message: Option<String>,
}

impl RecordingMessagingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that always fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub async fn sent_messages(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl MessagingTransport for RecordingMessagingTransport {
    async fn send(
        &self,
        _credentials: &MessagingCredentials,
        message: &OutgoingMessage,
    ) -> Result<SendReceipt, TransportError> {
        if let Some(reason) = &self.failure_message {
            return Err(TransportError::whatsapp(reason.clone()));
        }

        let mut sent = self.sent.lock().await;
        sent.push(message.clone());

        Ok(SendReceipt::new(
            Channel::Whatsapp,
            &message.to,
            format!("recorded-message-{}", sent.len()),
        ))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Resolves every reference to the same in-memory file. Clones share the record.
#[derive(Debug, Clone)]
pub struct StaticMediaResolver {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
    failure_message: Option<String>,
    resolved: Arc<Mutex<Vec<PathBuf>>>,
}

impl StaticMediaResolver {
    pub fn new(file_name: impl Into<String>, content_type: Option<&str>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.map(str::to_string),
            bytes: bytes.into(),
            failure_message: None,
            resolved: Arc::default(),
        }
    }

    /// Create a resolver whose fetches always fail
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure_message: Some(message.into()),
            ..Self::new("unused", None, Vec::<u8>::new())
        }
    }

    /// Paths handed out so far; each should be gone once its dispatch completes.
    pub async fn resolved_paths(&self) -> Vec<PathBuf> {
        self.resolved.lock().await.clone()
    }
}

impl Default for StaticMediaResolver {
    fn default() -> Self {
        Self::new("attachment.txt", Some("text/plain"), b"attachment".to_vec())
    }
}

#[async_trait]
impl MediaResolver for StaticMediaResolver {
    async fn resolve(&self, reference: &str) -> Result<ResolvedMedia, MediaError> {
        if let Some(reason) = &self.failure_message {
            return Err(MediaError::FetchFailed {
                url: reference.to_string(),
                reason: reason.clone(),
            });
        }

        let media =
            ResolvedMedia::from_bytes(&self.file_name, self.content_type.clone(), &self.bytes)
                .await?;
        self.resolved.lock().await.push(media.path().to_path_buf());
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            from: "relay@example.com".to_string(),
            to: "ops@example.com".to_string(),
            subject: "Test".to_string(),
            body: "Body".to_string(),
            attachment: None,
        }
    }

    #[tokio::test]
    async fn test_recording_email_transport_captures() {
        let transport = RecordingEmailTransport::new();
        let handle = transport.clone();
        let credentials = EmailCredentials::new("relay@example.com", "pw");

        let receipt = transport.send(&credentials, &email()).await.unwrap();
        assert_eq!(receipt.message_id, "recorded-email-1");
        assert_eq!(handle.sent_count().await, 1);
        assert!(handle.was_sent_to("ops@example.com").await);
        assert!(!handle.was_sent_to("other@example.com").await);
    }

    #[tokio::test]
    async fn test_failing_messaging_transport() {
        let transport = RecordingMessagingTransport::failing("Simulated outage");
        let credentials = MessagingCredentials::with_service("AC1", "tok", "MG1");
        let message = OutgoingMessage {
            to: "whatsapp:+15551234567".to_string(),
            body: "hi".to_string(),
            media_url: None,
        };

        let err = transport.send(&credentials, &message).await.unwrap_err();
        assert_eq!(err.reason, "Simulated outage");
        assert_eq!(transport.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_static_resolver_tracks_paths() {
        let resolver = StaticMediaResolver::new("chart.png", Some("image/png"), b"png".to_vec());
        let media = resolver.resolve("https://cdn.example.com/chart.png").await.unwrap();

        assert_eq!(media.file_name(), "chart.png");
        assert_eq!(resolver.resolved_paths().await, vec![media.path().to_path_buf()]);
    }
}
