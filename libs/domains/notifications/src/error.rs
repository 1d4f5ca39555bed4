//! Error types for the notifications domain.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_helpers::{
    ErrorCode,
    errors::{error_response, error_response_with_details},
};
use serde_json::json;
use thiserror::Error;

use crate::models::Channel;

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Failures while turning a media reference into a local attachment.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The reference is not an absolute http(s) URL.
    #[error("Invalid media reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    /// The remote fetch failed or returned a non-success status.
    #[error("Failed to fetch media from {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    /// The fetched bytes could not be written to local storage.
    #[error("Failed to store media locally: {0}")]
    WriteFailed(String),

    /// The media exceeds the configured size cap.
    #[error("Media at {url} exceeds the {limit} byte limit")]
    TooLarge { url: String, limit: u64 },
}

impl From<std::io::Error> for MediaError {
    fn from(err: std::io::Error) -> Self {
        MediaError::WriteFailed(err.to_string())
    }
}

/// A transport could not deliver a message on its channel.
#[derive(Debug, Error)]
#[error("{channel} transport error: {reason}")]
pub struct TransportError {
    pub channel: Channel,
    pub reason: String,
}

impl TransportError {
    pub fn new(channel: Channel, reason: impl Into<String>) -> Self {
        Self {
            channel,
            reason: reason.into(),
        }
    }

    pub fn email(reason: impl Into<String>) -> Self {
        Self::new(Channel::Email, reason)
    }

    pub fn whatsapp(reason: impl Into<String>) -> Self {
        Self::new(Channel::Whatsapp, reason)
    }
}

/// Every failure a dispatch can end in.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Required request fields are missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// Anything other than POST on a dispatch route.
    #[error("Invalid request method")]
    MethodNotAllowed,

    /// Credentials or settings for a channel are absent.
    #[error("{0}")]
    ConfigurationMissing(String),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::Validation(_) => StatusCode::BAD_REQUEST,
            DispatchError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            DispatchError::ConfigurationMissing(_)
            | DispatchError::Media(_)
            | DispatchError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            DispatchError::Validation(_) => ErrorCode::ValidationError,
            DispatchError::MethodNotAllowed => ErrorCode::MethodNotAllowed,
            DispatchError::ConfigurationMissing(_) => ErrorCode::ConfigurationMissing,
            DispatchError::Media(_) => ErrorCode::MediaError,
            DispatchError::Transport(_) => ErrorCode::TransportError,
        }
    }

    /// Renders the error as a failed delivery on `channel`, with `details` attached.
    pub(crate) fn into_delivery_response(
        self,
        channel: Channel,
        details: serde_json::Value,
    ) -> Response {
        let message = format!("Failed to send {}: {}", channel.label(), self);
        tracing::error!(
            error_code = self.error_code().code(),
            channel = %channel,
            "{}",
            message
        );
        error_response_with_details(self.status_code(), message, self.error_code(), details)
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            DispatchError::Validation(msg) => tracing::info!("Rejected request: {}", msg),
            DispatchError::MethodNotAllowed => {}
            other => tracing::error!(error_code = other.error_code().code(), "{}", other),
        }
        error_response(status, self.to_string(), self.error_code())
    }
}

/// Details payload for a delivery that failed before any message went out.
pub(crate) fn nothing_sent(channel: Channel) -> serde_json::Value {
    json!({ "channel": channel, "email_sent": false })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            DispatchError::Validation("Missing 'to' parameter".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DispatchError::MethodNotAllowed.status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            DispatchError::ConfigurationMissing("EMAIL_PASSWORD".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            DispatchError::from(TransportError::email("535 auth failed")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_media_error_maps_to_media_code() {
        let err: DispatchError = MediaError::FetchFailed {
            url: "https://cdn.example.com/a.png".into(),
            reason: "remote returned 404 Not Found".into(),
        }
        .into();
        assert_eq!(err.error_code(), ErrorCode::MediaError);
        assert!(err.to_string().contains("cdn.example.com"));
    }

    #[test]
    fn test_transport_error_display_names_channel() {
        let err = TransportError::whatsapp("authentication failed");
        assert_eq!(
            err.to_string(),
            "whatsapp transport error: authentication failed"
        );
    }

    #[test]
    fn test_io_error_becomes_write_failure() {
        let io = std::io::Error::other("disk full");
        assert!(matches!(MediaError::from(io), MediaError::WriteFailed(msg) if msg == "disk full"));
    }
}
