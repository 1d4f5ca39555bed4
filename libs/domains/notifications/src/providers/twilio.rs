//! Twilio Messages API transport for WhatsApp.

use super::MessagingTransport;
use crate::config::{MessagingCredentials, TwilioSettings};
use crate::dispatcher::whatsapp_address;
use crate::error::TransportError;
use crate::models::{Channel, OutgoingMessage, SendReceipt};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info};

/// WhatsApp transport backed by the Twilio REST API.
#[derive(Debug, Clone)]
pub struct TwilioTransport {
    client: Client,
    api_base: String,
}

impl TwilioTransport {
    pub fn new(settings: &TwilioSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn messages_url(&self, account_sid: &str) -> String {
        format!("{}/Accounts/{}/Messages.json", self.api_base, account_sid)
    }

    fn form(credentials: &MessagingCredentials, message: &OutgoingMessage) -> Vec<(&'static str, String)> {
        let mut form = vec![("To", message.to.clone()), ("Body", message.body.clone())];
        if let Some(service_sid) = credentials.messaging_service_sid() {
            form.push(("MessagingServiceSid", service_sid.to_string()));
        }
        if let Some(from) = credentials.from() {
            form.push(("From", whatsapp_address(from)));
        }
        if let Some(media_url) = &message.media_url {
            form.push(("MediaUrl", media_url.clone()));
        }
        form
    }
}

// Twilio API response structures

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioError {
    code: Option<i64>,
    message: Option<String>,
}

fn describe_failure(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<TwilioError>(body).ok();
    let detail = parsed
        .as_ref()
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| body.trim().to_string());
    let code = parsed
        .and_then(|e| e.code)
        .map(|c| format!(" [{}]", c))
        .unwrap_or_default();

    if status == StatusCode::UNAUTHORIZED {
        format!("authentication failed{}: {}", code, detail)
    } else {
        format!("Twilio error ({}){}: {}", status, code, detail)
    }
}

#[async_trait]
impl MessagingTransport for TwilioTransport {
    async fn send(
        &self,
        credentials: &MessagingCredentials,
        message: &OutgoingMessage,
    ) -> Result<SendReceipt, TransportError> {
        debug!(
            to = %message.to,
            has_media = message.media_url.is_some(),
            via_service = credentials.messaging_service_sid().is_some(),
            "Sending WhatsApp message via Twilio"
        );

        let response = self
            .client
            .post(self.messages_url(credentials.account_sid()))
            .basic_auth(credentials.account_sid(), Some(credentials.auth_token()))
            .form(&Self::form(credentials, message))
            .send()
            .await
            .map_err(|e| TransportError::whatsapp(format!("Twilio request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let reason = describe_failure(status, &error_body);
            error!(to = %message.to, status = %status, error = %reason, "Failed to send WhatsApp message via Twilio");
            return Err(TransportError::whatsapp(reason));
        }

        let created: TwilioMessage = response.json().await.map_err(|e| {
            TransportError::whatsapp(format!("Unexpected Twilio response: {}", e))
        })?;

        info!(
            to = %message.to,
            message_id = %created.sid,
            status = ?created.status,
            "WhatsApp message accepted by Twilio"
        );

        Ok(SendReceipt::new(Channel::Whatsapp, &message.to, created.sid))
    }

    fn name(&self) -> &'static str {
        "Twilio"
    }
}
