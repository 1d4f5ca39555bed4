//! Notifications Domain
//!
//! Relays notifications to email (SMTP) and WhatsApp (Twilio).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   API Handler   │  ← /send-email, /send-whatsapp, /send-message
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │ DispatchFacade  │  ← validation, configuration preflight, ordering
//! └───┬─────────┬───┘
//!     │         │
//! ┌───▼───┐ ┌───▼──────┐
//! │ Email │ │ WhatsApp │  ← per-channel dispatchers
//! └───┬───┘ └───┬──────┘
//!     │         │
//! ┌───▼───┐ ┌───▼──────┐
//! │ SMTP  │ │  Twilio  │  ← transports
//! └───────┘ └──────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_notifications::{ChannelPolicy, DispatchFacade, NotificationRequest};
//!
//! let outcome = facade
//!     .handle(
//!         ChannelPolicy::EmailOnly,
//!         NotificationRequest::email("ops@example.com", "Deploy", "v1.2.3 is live", None),
//!     )
//!     .await;
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod media;
pub mod models;
pub mod providers;
pub mod service;

use std::sync::Arc;

// Re-export commonly used types
pub use config::{
    ConfigGap, ConfiguredNotification, EmailCredentials, MessagingCredentials,
    NotificationsConfig, RelayMode,
};
pub use dispatcher::{EmailDispatcher, MessagingDispatcher, whatsapp_address};
pub use error::{DispatchError, DispatchResult, MediaError, TransportError};
pub use handlers::{ApiDoc, router};
pub use media::{HttpMediaResolver, MediaResolver, ResolvedMedia};
pub use models::{
    Channel, ChannelPolicy, DispatchOutcome, DispatchReceipt, NotificationRequest, SendReceipt,
};
pub use providers::{EmailTransport, MessagingTransport, SmtpTransport, TwilioTransport};
pub use service::DispatchFacade;

/// Wires the production transports (lettre SMTP, Twilio, HTTP media fetch) from `config`.
pub fn build_facade(config: &NotificationsConfig) -> Result<DispatchFacade, reqwest::Error> {
    let resolver = Arc::new(HttpMediaResolver::new(&config.media)?);
    let smtp = Arc::new(SmtpTransport::new(config.smtp.clone()));
    let twilio = Arc::new(TwilioTransport::new(&config.twilio)?);

    Ok(DispatchFacade::new(
        EmailDispatcher::new(config.email.clone(), smtp, resolver),
        MessagingDispatcher::new(config.messaging.clone(), twilio),
    ))
}
