//! Outbound transports.
//!
//! This module contains the `EmailTransport` and `MessagingTransport` traits and
//! their implementations: SMTP via lettre, the Twilio Messages API, and recording
//! doubles for tests and local runs.

mod mock;
mod smtp;
mod twilio;

pub use mock::{
    RecordedEmail, RecordingEmailTransport, RecordingMessagingTransport, StaticMediaResolver,
};
pub use smtp::SmtpTransport;
pub use twilio::TwilioTransport;

use async_trait::async_trait;

use crate::config::{EmailCredentials, MessagingCredentials};
use crate::error::TransportError;
use crate::models::{OutgoingEmail, OutgoingMessage, SendReceipt};

/// Sends email on behalf of an authenticated sender.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(
        &self,
        credentials: &EmailCredentials,
        email: &OutgoingEmail,
    ) -> Result<SendReceipt, TransportError>;

    /// Get the transport name for logging.
    fn name(&self) -> &'static str;
}

/// Sends WhatsApp messages through a messaging provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingTransport: Send + Sync {
    async fn send(
        &self,
        credentials: &MessagingCredentials,
        message: &OutgoingMessage,
    ) -> Result<SendReceipt, TransportError>;

    /// Get the transport name for logging.
    fn name(&self) -> &'static str;
}
