//! Dispatch façade: validates a notification, checks channel configuration, then
//! drives the dispatchers in order (email first, WhatsApp second).

use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::{ConfigGap, ConfiguredNotification};
use crate::dispatcher::{EmailDispatcher, MessagingDispatcher};
use crate::error::DispatchResult;
use crate::models::{
    ChannelPolicy, DispatchOutcome, DispatchReceipt, EmailTarget, NotificationRequest,
};

/// The validated work a dispatch will perform.
#[derive(Debug)]
struct DispatchPlan {
    email: Option<EmailTarget>,
    whatsapp_to: Option<String>,
    body: String,
    media_url: Option<String>,
}

fn plan(policy: ChannelPolicy, request: NotificationRequest) -> Result<DispatchPlan, String> {
    if policy.includes_email() && request.email.is_none() {
        return Err("Missing email parameters: 'to' and 'subject' are required".to_string());
    }
    if policy.includes_messaging() && request.whatsapp_to.is_none() {
        return Err("Missing WhatsApp parameters: 'to' is required".to_string());
    }
    request.validate().map_err(|e| e.to_string())?;

    Ok(DispatchPlan {
        email: request.email.filter(|_| policy.includes_email()),
        whatsapp_to: request.whatsapp_to.filter(|_| policy.includes_messaging()),
        body: request.body,
        media_url: request.media_url,
    })
}

#[derive(Clone)]
pub struct DispatchFacade {
    email: EmailDispatcher,
    messaging: MessagingDispatcher,
}

impl DispatchFacade {
    pub fn new(email: EmailDispatcher, messaging: MessagingDispatcher) -> Self {
        Self { email, messaging }
    }

    pub fn email(&self) -> &EmailDispatcher {
        &self.email
    }

    pub fn messaging(&self) -> &MessagingDispatcher {
        &self.messaging
    }

    /// Dispatches `request` on the channels `policy` selects.
    ///
    /// No outbound call is made unless the request is valid and every selected
    /// channel is configured. A WhatsApp failure after a successful email is
    /// reported with the email receipt attached.
    pub async fn handle(&self, policy: ChannelPolicy, request: NotificationRequest) -> DispatchOutcome {
        let dispatch_id = Uuid::new_v4();
        let span = info_span!("dispatch", %dispatch_id, ?policy);
        self.run(dispatch_id, policy, request).instrument(span).await
    }

    /// Dispatches the notification loaded from configuration to both channels.
    ///
    /// The caller supplied nothing, so a job that fails validation is a server
    /// configuration fault (500), never a bad request.
    pub async fn handle_configured(
        &self,
        configured: &Result<ConfiguredNotification, ConfigGap>,
    ) -> DispatchOutcome {
        match configured {
            Ok(job) => match self.handle(ChannelPolicy::Both, job.to_request()).await {
                DispatchOutcome::ValidationFailed(message) => {
                    warn!(reason = %message, "Configured notification is invalid");
                    DispatchOutcome::ConfigurationMissing(format!(
                        "Invalid notification settings in environment variables: {message}"
                    ))
                }
                outcome => outcome,
            },
            Err(gap) => {
                warn!(settings = %gap, "Configured notification is incomplete or invalid");
                DispatchOutcome::ConfigurationMissing(format!(
                    "Missing or invalid notification settings in environment variables: {gap}"
                ))
            }
        }
    }

    fn preflight(&self, plan: &DispatchPlan) -> DispatchResult<()> {
        if plan.email.is_some() {
            self.email.credentials()?;
        }
        if plan.whatsapp_to.is_some() {
            self.messaging.credentials()?;
        }
        Ok(())
    }

    async fn run(
        &self,
        dispatch_id: Uuid,
        policy: ChannelPolicy,
        request: NotificationRequest,
    ) -> DispatchOutcome {
        let plan = match plan(policy, request) {
            Ok(plan) => plan,
            Err(message) => {
                info!(reason = %message, "Dispatch rejected");
                return DispatchOutcome::ValidationFailed(message);
            }
        };

        if let Err(e) = self.preflight(&plan) {
            return DispatchOutcome::ConfigurationMissing(e.to_string());
        }

        let media = plan.media_url.as_deref();

        let email = match &plan.email {
            Some(target) => {
                match self
                    .email
                    .send_email(&target.to, &target.subject, &plan.body, media)
                    .await
                {
                    Ok(receipt) => Some(receipt),
                    Err(error) => return DispatchOutcome::EmailFailed(error),
                }
            }
            None => None,
        };

        let whatsapp = match &plan.whatsapp_to {
            Some(to) => match self.messaging.send_whatsapp(to, &plan.body, media).await {
                Ok(receipt) => Some(receipt),
                Err(error) => {
                    if email.is_some() {
                        warn!("WhatsApp delivery failed after the email was sent");
                    }
                    return DispatchOutcome::MessagingFailed { error, email };
                }
            },
            None => None,
        };

        info!(
            email_sent = email.is_some(),
            whatsapp_sent = whatsapp.is_some(),
            "Dispatch complete"
        );
        DispatchOutcome::Sent(DispatchReceipt {
            dispatch_id,
            email,
            whatsapp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use crate::config::{EmailCredentials, MessagingCredentials};
    use crate::error::DispatchError;
    use crate::providers::{
        RecordingEmailTransport, RecordingMessagingTransport, StaticMediaResolver,
    };
    use std::sync::Arc;

    struct Harness {
        facade: DispatchFacade,
        email: RecordingEmailTransport,
        messaging: RecordingMessagingTransport,
        resolver: StaticMediaResolver,
    }

    fn harness_with(
        email: RecordingEmailTransport,
        messaging: RecordingMessagingTransport,
        email_credentials: Result<EmailCredentials, ConfigGap>,
        messaging_credentials: Result<MessagingCredentials, ConfigGap>,
    ) -> Harness {
        let resolver = StaticMediaResolver::default();
        let facade = DispatchFacade::new(
            EmailDispatcher::new(
                email_credentials,
                Arc::new(email.clone()),
                Arc::new(resolver.clone()),
            ),
            MessagingDispatcher::new(messaging_credentials, Arc::new(messaging.clone())),
        );
        Harness {
            facade,
            email,
            messaging,
            resolver,
        }
    }

    fn harness() -> Harness {
        harness_with(
            RecordingEmailTransport::new(),
            RecordingMessagingTransport::new(),
            Ok(EmailCredentials::new("relay@example.com", "pw")),
            Ok(MessagingCredentials::with_service("AC1", "tok", "MG1")),
        )
    }

    fn both() -> NotificationRequest {
        NotificationRequest::both(
            "ops@example.com",
            "Deploy finished",
            "+15551234567",
            "v1.2.3 is live",
            None,
        )
    }

    #[tokio::test]
    async fn test_both_channels_sent_in_order() {
        let h = harness();
        let outcome = h.facade.handle(ChannelPolicy::Both, both()).await;

        let DispatchOutcome::Sent(receipt) = outcome else {
            panic!("expected a Sent outcome");
        };
        assert!(receipt.email.is_some());
        assert_eq!(receipt.whatsapp.unwrap().to, "whatsapp:+15551234567");
        assert_eq!(h.email.sent_count().await, 1);
        assert_eq!(h.messaging.sent_count().await, 1);
    }

    #[tokio::test]
    async fn test_email_failure_skips_whatsapp() {
        let h = harness_with(
            RecordingEmailTransport::failing("535 auth failed"),
            RecordingMessagingTransport::new(),
            Ok(EmailCredentials::new("relay@example.com", "pw")),
            Ok(MessagingCredentials::with_service("AC1", "tok", "MG1")),
        );

        let outcome = h.facade.handle(ChannelPolicy::Both, both()).await;
        assert!(matches!(outcome, DispatchOutcome::EmailFailed(DispatchError::Transport(_))));
        assert_eq!(h.messaging.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_whatsapp_failure_reports_sent_email() {
        let h = harness_with(
            RecordingEmailTransport::new(),
            RecordingMessagingTransport::failing("authentication failed"),
            Ok(EmailCredentials::new("relay@example.com", "pw")),
            Ok(MessagingCredentials::with_service("AC1", "tok", "MG1")),
        );

        let outcome = h.facade.handle(ChannelPolicy::Both, both()).await;
        let DispatchOutcome::MessagingFailed { email, .. } = outcome else {
            panic!("expected a MessagingFailed outcome");
        };
        assert_eq!(email.unwrap().to, "ops@example.com");
        assert_eq!(h.email.sent_count().await, 1);
    }

    #[tokio::test]
    async fn test_missing_messaging_config_blocks_email() {
        let h = harness_with(
            RecordingEmailTransport::new(),
            RecordingMessagingTransport::new(),
            Ok(EmailCredentials::new("relay@example.com", "pw")),
            Err(ConfigGap::new(["TWILIO_AUTH_TOKEN"])),
        );

        let outcome = h.facade.handle(ChannelPolicy::Both, both()).await;
        assert!(matches!(outcome, DispatchOutcome::ConfigurationMissing(ref msg) if msg.contains("TWILIO_AUTH_TOKEN")));
        assert_eq!(h.email.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_email_only_ignores_messaging_config() {
        let h = harness_with(
            RecordingEmailTransport::new(),
            RecordingMessagingTransport::new(),
            Ok(EmailCredentials::new("relay@example.com", "pw")),
            Err(ConfigGap::new(["TWILIO_ACCOUNT_SID"])),
        );

        let request = NotificationRequest::email("ops@example.com", "Hi", "Body", None);
        let outcome = h.facade.handle(ChannelPolicy::EmailOnly, request).await;
        assert!(outcome.is_sent());
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_calls() {
        let h = harness();
        let request = NotificationRequest::both("not-an-email", "Hi", "+15551234567", "Body", None);

        let outcome = h.facade.handle(ChannelPolicy::Both, request).await;
        assert!(matches!(outcome, DispatchOutcome::ValidationFailed(_)));
        assert_eq!(h.email.sent_count().await, 0);
        assert_eq!(h.messaging.sent_count().await, 0);
        assert!(h.resolver.resolved_paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_policy_requires_its_channels() {
        let h = harness();
        let request = NotificationRequest::email("ops@example.com", "Hi", "Body", None);

        let outcome = h.facade.handle(ChannelPolicy::Both, request).await;
        assert!(matches!(outcome, DispatchOutcome::ValidationFailed(ref msg) if msg.contains("WhatsApp")));
    }

    #[tokio::test]
    async fn test_media_resolved_for_email_and_passed_to_whatsapp() {
        let h = harness();
        let request = NotificationRequest::both(
            "ops@example.com",
            "Chart",
            "+15551234567",
            "See attached",
            Some("https://cdn.example.com/chart.png".into()),
        );

        assert!(h.facade.handle(ChannelPolicy::Both, request).await.is_sent());

        let emails = h.email.sent_emails().await;
        assert!(emails[0].attachment_contents.is_some());
        let messages = h.messaging.sent_messages().await;
        assert_eq!(
            messages[0].media_url.as_deref(),
            Some("https://cdn.example.com/chart.png")
        );
        assert!(!h.resolver.resolved_paths().await[0].exists());
    }

    #[tokio::test]
    async fn test_handle_configured_with_gap() {
        let h = harness();
        let outcome = h
            .facade
            .handle_configured(&Err(ConfigGap::new(["TO_EMAIL", "MESSAGE_BODY"])))
            .await;

        assert!(matches!(outcome, DispatchOutcome::ConfigurationMissing(ref msg) if msg.contains("TO_EMAIL, MESSAGE_BODY")));
        assert_eq!(h.email.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_handle_configured_invalid_job_is_server_fault() {
        let h = harness();
        let job = ConfiguredNotification {
            email_to: "not-an-email".into(),
            whatsapp_to: "call-me".into(),
            subject: "Nightly".into(),
            body: "All green".into(),
            media_url: None,
        };

        let outcome = h.facade.handle_configured(&Ok(job)).await;
        assert!(matches!(outcome, DispatchOutcome::ConfigurationMissing(ref msg) if msg.starts_with("Invalid notification settings")));
        assert_eq!(outcome.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(h.email.sent_count().await, 0);
        assert_eq!(h.messaging.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_repeated_dispatch_sends_again() {
        let h = harness();

        assert!(h.facade.handle(ChannelPolicy::Both, both()).await.is_sent());
        assert!(h.facade.handle(ChannelPolicy::Both, both()).await.is_sent());

        assert_eq!(h.email.sent_count().await, 2);
        assert_eq!(h.messaging.sent_count().await, 2);
    }

    #[tokio::test]
    async fn test_handle_configured_sends_both() {
        let h = harness();
        let job = ConfiguredNotification {
            email_to: "ops@example.com".into(),
            whatsapp_to: "+15551234567".into(),
            subject: "Nightly".into(),
            body: "All green".into(),
            media_url: None,
        };

        assert!(h.facade.handle_configured(&Ok(job)).await.is_sent());
        assert!(h.email.was_sent_to("ops@example.com").await);
        assert_eq!(h.messaging.sent_count().await, 1);
    }
}
