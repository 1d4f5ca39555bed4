//! Data models for the notifications domain.

use std::path::PathBuf;
use std::sync::LazyLock;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_helpers::{ErrorCode, errors::error_response};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum::{Display, EnumString};
use utoipa::ToSchema;
use url::Url;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{DispatchError, nothing_sent};

/// Delivery channel a receipt or failure belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    Email,
    Whatsapp,
}

impl Channel {
    /// Human wording used in response messages.
    pub fn label(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Whatsapp => "WhatsApp message",
        }
    }
}

static WHATSAPP_HANDLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(whatsapp:)?\+?[0-9]{6,15}$").expect("whatsapp handle pattern is valid")
});

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be blank".into()));
    }
    Ok(())
}

fn validate_whatsapp_handle(value: &str) -> Result<(), ValidationError> {
    validate_not_blank(value)?;
    if !WHATSAPP_HANDLE.is_match(value.trim()) {
        return Err(ValidationError::new("invalid_whatsapp_handle")
            .with_message("must be a phone number in international format, e.g. +15551234567".into()));
    }
    Ok(())
}

fn validate_media_url(value: &str) -> Result<(), ValidationError> {
    match Url::parse(value.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(ValidationError::new("invalid_media_url")
            .with_message("must be an absolute http(s) URL".into())),
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// Body of `POST /send-email`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SendEmailRequest {
    /// Recipient email address
    #[schema(example = "ops@example.com")]
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
    /// Optional http(s) URL of a file to attach
    pub media_url: Option<String>,
}

/// Body of `POST /send-whatsapp`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SendWhatsAppRequest {
    /// Recipient phone number in international format
    #[schema(example = "+15551234567")]
    pub to: String,
    /// Message text
    pub body: String,
    /// Optional http(s) URL of media to send with the message
    #[serde(alias = "media")]
    pub media_url: Option<String>,
}

/// Email half of a combined dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct EmailTarget {
    #[validate(email(message = "must be a valid email address"))]
    #[schema(example = "ops@example.com")]
    pub to: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub subject: String,
}

/// WhatsApp half of a combined dispatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct WhatsAppTarget {
    #[schema(example = "+15551234567")]
    pub to: String,
}

/// Body of `POST /send-message`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SendMessageRequest {
    pub email: Option<EmailTarget>,
    pub whatsapp: Option<WhatsAppTarget>,
    /// Text shared by both channels
    pub body: String,
    #[serde(alias = "media")]
    pub media_url: Option<String>,
}

// ============================================================================
// Domain types
// ============================================================================

/// Which channels a dispatch must deliver on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPolicy {
    EmailOnly,
    MessagingOnly,
    Both,
}

impl ChannelPolicy {
    pub fn includes_email(self) -> bool {
        matches!(self, ChannelPolicy::EmailOnly | ChannelPolicy::Both)
    }

    pub fn includes_messaging(self) -> bool {
        matches!(self, ChannelPolicy::MessagingOnly | ChannelPolicy::Both)
    }
}

/// A notification to dispatch, whatever surface it arrived on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Validate)]
pub struct NotificationRequest {
    #[validate(nested)]
    pub email: Option<EmailTarget>,
    #[validate(custom(function = "validate_whatsapp_handle"))]
    pub whatsapp_to: Option<String>,
    #[validate(custom(function = "validate_not_blank"))]
    pub body: String,
    #[validate(custom(function = "validate_media_url"))]
    pub media_url: Option<String>,
}

impl NotificationRequest {
    pub fn email(
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        media_url: Option<String>,
    ) -> Self {
        Self {
            email: Some(EmailTarget {
                to: to.into(),
                subject: subject.into(),
            }),
            whatsapp_to: None,
            body: body.into(),
            media_url,
        }
    }

    pub fn whatsapp(
        to: impl Into<String>,
        body: impl Into<String>,
        media_url: Option<String>,
    ) -> Self {
        Self {
            email: None,
            whatsapp_to: Some(to.into()),
            body: body.into(),
            media_url,
        }
    }

    pub fn both(
        email_to: impl Into<String>,
        subject: impl Into<String>,
        whatsapp_to: impl Into<String>,
        body: impl Into<String>,
        media_url: Option<String>,
    ) -> Self {
        Self {
            whatsapp_to: Some(whatsapp_to.into()),
            ..Self::email(email_to, subject, body, media_url)
        }
    }
}

impl From<SendEmailRequest> for NotificationRequest {
    fn from(req: SendEmailRequest) -> Self {
        Self::email(req.to, req.subject, req.body, blank_as_none(req.media_url))
    }
}

impl From<SendWhatsAppRequest> for NotificationRequest {
    fn from(req: SendWhatsAppRequest) -> Self {
        Self::whatsapp(req.to, req.body, blank_as_none(req.media_url))
    }
}

impl From<SendMessageRequest> for NotificationRequest {
    fn from(req: SendMessageRequest) -> Self {
        Self {
            email: req.email,
            whatsapp_to: req.whatsapp.map(|w| w.to),
            body: req.body,
            media_url: blank_as_none(req.media_url),
        }
    }
}

fn blank_as_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// A local file attached to an outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: Option<String>,
}

/// An email ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
}

/// A WhatsApp message ready for the transport.
///
/// `to` already carries the `whatsapp:` channel prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: String,
    pub body: String,
    pub media_url: Option<String>,
}

/// Proof that one channel accepted a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SendReceipt {
    pub channel: Channel,
    pub to: String,
    /// Provider-assigned message identifier
    pub message_id: String,
    pub sent_at: DateTime<Utc>,
}

impl SendReceipt {
    pub fn new(channel: Channel, to: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            channel,
            to: to.into(),
            message_id: message_id.into(),
            sent_at: Utc::now(),
        }
    }
}

/// Successful dispatch, one receipt per delivered channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DispatchReceipt {
    pub dispatch_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<SendReceipt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<SendReceipt>,
}

impl DispatchReceipt {
    pub fn summary(&self) -> &'static str {
        match (&self.email, &self.whatsapp) {
            (Some(_), Some(_)) => "Email and WhatsApp message sent successfully",
            (None, Some(_)) => "WhatsApp message sent successfully",
            _ => "Email sent successfully",
        }
    }
}

/// Response body for a successful dispatch.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SentResponse {
    /// Always `"sent"`
    #[schema(example = "sent")]
    pub status: String,
    pub message: String,
    #[serde(flatten)]
    pub receipt: DispatchReceipt,
}

impl From<DispatchReceipt> for SentResponse {
    fn from(receipt: DispatchReceipt) -> Self {
        Self {
            status: "sent".to_string(),
            message: receipt.summary().to_string(),
            receipt,
        }
    }
}

/// How a dispatch ended.
#[derive(Debug)]
pub enum DispatchOutcome {
    Sent(DispatchReceipt),
    /// The email leg failed; nothing was sent.
    EmailFailed(DispatchError),
    /// The WhatsApp leg failed. `email` holds the receipt when the email already went out.
    MessagingFailed {
        error: DispatchError,
        email: Option<SendReceipt>,
    },
    ValidationFailed(String),
    ConfigurationMissing(String),
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchOutcome::Sent(_) => StatusCode::OK,
            DispatchOutcome::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            DispatchOutcome::EmailFailed(e) => e.status_code(),
            DispatchOutcome::MessagingFailed { error, .. } => error.status_code(),
            DispatchOutcome::ConfigurationMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converts the outcome into a plain result, for callers without an HTTP surface.
    pub fn into_result(self) -> Result<DispatchReceipt, DispatchError> {
        match self {
            DispatchOutcome::Sent(receipt) => Ok(receipt),
            DispatchOutcome::EmailFailed(error) => Err(error),
            DispatchOutcome::MessagingFailed { error, .. } => Err(error),
            DispatchOutcome::ValidationFailed(msg) => Err(DispatchError::Validation(msg)),
            DispatchOutcome::ConfigurationMissing(msg) => {
                Err(DispatchError::ConfigurationMissing(msg))
            }
        }
    }
}

impl IntoResponse for DispatchOutcome {
    fn into_response(self) -> Response {
        match self {
            DispatchOutcome::Sent(receipt) => {
                (StatusCode::OK, Json(SentResponse::from(receipt))).into_response()
            }
            DispatchOutcome::EmailFailed(error) => {
                error.into_delivery_response(Channel::Email, nothing_sent(Channel::Email))
            }
            DispatchOutcome::MessagingFailed { error, email } => {
                let details = match email {
                    Some(receipt) => json!({
                        "channel": Channel::Whatsapp,
                        "email_sent": true,
                        "email": receipt,
                    }),
                    None => nothing_sent(Channel::Whatsapp),
                };
                error.into_delivery_response(Channel::Whatsapp, details)
            }
            DispatchOutcome::ValidationFailed(msg) => DispatchError::Validation(msg).into_response(),
            DispatchOutcome::ConfigurationMissing(msg) => {
                tracing::error!(
                    error_code = ErrorCode::ConfigurationMissing.code(),
                    "{}",
                    msg
                );
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    msg,
                    ErrorCode::ConfigurationMissing,
                )
            }
        }
    }
}
