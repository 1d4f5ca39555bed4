//! Per-channel dispatchers.
//!
//! Each dispatcher owns its channel's credentials and transport. Email media is
//! resolved to a local file for the duration of the send; WhatsApp media is
//! handed to the provider as a URL.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{ConfigGap, EmailCredentials, MessagingCredentials};
use crate::error::{DispatchError, DispatchResult};
use crate::media::{MediaResolver, ResolvedMedia};
use crate::models::{OutgoingEmail, OutgoingMessage, SendReceipt};
use crate::providers::{EmailTransport, MessagingTransport};

pub const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Addresses `handle` on the WhatsApp channel, adding the prefix only if absent.
pub fn whatsapp_address(handle: &str) -> String {
    let handle = handle.trim();
    if handle.starts_with(WHATSAPP_PREFIX) {
        handle.to_string()
    } else {
        format!("{WHATSAPP_PREFIX}{handle}")
    }
}

fn require(field: &str, value: &str) -> DispatchResult<()> {
    if value.trim().is_empty() {
        return Err(DispatchError::Validation(format!(
            "Missing '{field}' parameter"
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct EmailDispatcher {
    credentials: Result<EmailCredentials, ConfigGap>,
    transport: Arc<dyn EmailTransport>,
    resolver: Arc<dyn MediaResolver>,
}

impl EmailDispatcher {
    pub fn new(
        credentials: Result<EmailCredentials, ConfigGap>,
        transport: Arc<dyn EmailTransport>,
        resolver: Arc<dyn MediaResolver>,
    ) -> Self {
        Self {
            credentials,
            transport,
            resolver,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_ok()
    }

    pub fn credentials(&self) -> DispatchResult<&EmailCredentials> {
        self.credentials.as_ref().map_err(|gap| {
            DispatchError::ConfigurationMissing(format!(
                "Missing email credentials in environment variables: {gap}"
            ))
        })
    }

    /// Sends one plain-text email, attaching the resolved media when a reference is given.
    ///
    /// The resolved file is removed as soon as the transport returns, whether or not
    /// the send succeeded.
    #[instrument(skip_all, fields(channel = "email", transport = self.transport.name(), to = %to))]
    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        media_ref: Option<&str>,
    ) -> DispatchResult<SendReceipt> {
        require("to", to)?;
        require("subject", subject)?;
        require("body", body)?;
        let credentials = self.credentials()?;

        let media: Option<ResolvedMedia> = match media_ref {
            Some(reference) => Some(self.resolver.resolve(reference).await?),
            None => None,
        };

        let email = OutgoingEmail {
            from: credentials.sender().to_string(),
            to: to.trim().to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            attachment: media.as_ref().map(ResolvedMedia::as_attachment),
        };

        let result = self.transport.send(credentials, &email).await;
        drop(media);

        let receipt = result?;
        info!(message_id = %receipt.message_id, "Email dispatched");
        Ok(receipt)
    }
}

#[derive(Clone)]
pub struct MessagingDispatcher {
    credentials: Result<MessagingCredentials, ConfigGap>,
    transport: Arc<dyn MessagingTransport>,
}

impl MessagingDispatcher {
    pub fn new(
        credentials: Result<MessagingCredentials, ConfigGap>,
        transport: Arc<dyn MessagingTransport>,
    ) -> Self {
        Self {
            credentials,
            transport,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_ok()
    }

    pub fn credentials(&self) -> DispatchResult<&MessagingCredentials> {
        self.credentials.as_ref().map_err(|gap| {
            DispatchError::ConfigurationMissing(format!(
                "Missing Twilio credentials in environment variables: {gap}"
            ))
        })
    }

    /// Sends one WhatsApp message, passing the media reference through unresolved.
    #[instrument(skip_all, fields(channel = "whatsapp", transport = self.transport.name(), to = %to))]
    pub async fn send_whatsapp(
        &self,
        to: &str,
        body: &str,
        media_ref: Option<&str>,
    ) -> DispatchResult<SendReceipt> {
        require("to", to)?;
        require("body", body)?;
        let credentials = self.credentials()?;

        let message = OutgoingMessage {
            to: whatsapp_address(to),
            body: body.to_string(),
            media_url: media_ref.map(str::to_string),
        };

        let receipt = self.transport.send(credentials, &message).await?;
        info!(message_id = %receipt.message_id, "WhatsApp message dispatched");
        Ok(receipt)
    }
}
