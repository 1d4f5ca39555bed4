//! Notification Relay
//!
//! HTTP front end for the notifications domain.
//!
//! ## Endpoints
//!
//! - `POST /send-email`, `POST /send-whatsapp`, `POST /send-message`
//! - `/health` (liveness) and `/ready` (channel configuration)
//! - `/swagger-ui` and `/api-docs/openapi.json`
//!
//! `relay_send` runs the configured notification once without starting a server.

use axum::Router;
use axum_helpers::server::{create_production_app, create_router, health_router};
use core_config::tracing::init_tracing;
use domain_notifications::{
    ConfigGap, ConfiguredNotification, DispatchFacade, DispatchReceipt, build_facade,
};
use eyre::{Result, WrapErr};
use std::time::Duration;
use tracing::{info, warn};

pub mod config;
pub mod openapi;

use config::Config;
use openapi::ApiDoc;

/// In-flight sends get this long to finish after a shutdown signal.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Assembles the full application router.
pub fn app(config: &Config, facade: DispatchFacade) -> Router {
    let routes = domain_notifications::router(facade, config.notifications.mode.clone());

    // create_router adds docs/middleware; /health reports name and version
    create_router::<ApiDoc>(routes, &config.allowed_origins).merge(health_router(config.app))
}

fn log_channel_status(config: &Config) {
    let notifications = &config.notifications;
    if let Err(gap) = &notifications.email {
        warn!(missing = %gap, "Email channel is not configured");
    }
    if let Err(gap) = &notifications.messaging {
        warn!(missing = %gap, "WhatsApp channel is not configured");
    }
    info!(
        configuration_sourced = notifications.mode.is_configuration_sourced(),
        smtp_host = %notifications.smtp.host,
        "Relay configured"
    );
}

/// Loads configuration, then serves the relay until a shutdown signal arrives.
pub async fn run() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing with ErrorLayer for span trace capture
    init_tracing(&config.environment);
    log_channel_status(&config);

    let facade =
        build_facade(&config.notifications).wrap_err("Failed to build outbound HTTP clients")?;
    let router = app(&config, facade);

    info!(
        "Starting relay API with graceful shutdown ({}s timeout)",
        SHUTDOWN_TIMEOUT.as_secs()
    );

    create_production_app(router, &config.server, SHUTDOWN_TIMEOUT)
        .await
        .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Relay API shutdown complete");
    Ok(())
}

/// Dispatches the configured notification once, failing on any unsent channel.
pub async fn send_configured(
    facade: &DispatchFacade,
    configured: &std::result::Result<ConfiguredNotification, ConfigGap>,
) -> Result<DispatchReceipt> {
    facade
        .handle_configured(configured)
        .await
        .into_result()
        .wrap_err("Notification dispatch failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use core_config::{Environment, app_info, server::ServerConfig};
    use domain_notifications::providers::{
        RecordingEmailTransport, RecordingMessagingTransport, StaticMediaResolver,
    };
    use domain_notifications::{
        EmailCredentials, EmailDispatcher, MessagingCredentials, MessagingDispatcher,
        NotificationsConfig, RelayMode,
        config::{MediaSettings, SmtpSettings, TwilioSettings},
    };
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn config() -> Config {
        Config {
            app: app_info!(),
            server: ServerConfig::default(),
            environment: Environment::Development,
            notifications: NotificationsConfig {
                email: Ok(EmailCredentials::new("relay@example.com", "pw")),
                messaging: Ok(MessagingCredentials::with_service("AC1", "tok", "MG1")),
                smtp: SmtpSettings::default(),
                twilio: TwilioSettings::default(),
                media: MediaSettings::default(),
                mode: RelayMode::RequestSourced,
            },
            allowed_origins: Vec::new(),
        }
    }

    fn facade(
        email: RecordingEmailTransport,
        messaging: RecordingMessagingTransport,
    ) -> DispatchFacade {
        let config = config();
        DispatchFacade::new(
            EmailDispatcher::new(
                config.notifications.email,
                Arc::new(email),
                Arc::new(StaticMediaResolver::default()),
            ),
            MessagingDispatcher::new(config.notifications.messaging, Arc::new(messaging)),
        )
    }

    #[tokio::test]
    async fn test_health_reports_package() {
        let app = app(
            &config(),
            facade(RecordingEmailTransport::new(), RecordingMessagingTransport::new()),
        );

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["name"], "relay_api");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404_json() {
        let app = app(
            &config(),
            facade(RecordingEmailTransport::new(), RecordingMessagingTransport::new()),
        );

        let response = app
            .oneshot(Request::get("/send-sms").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn test_send_configured_returns_receipt() {
        let email = RecordingEmailTransport::new();
        let facade = facade(email.clone(), RecordingMessagingTransport::new());
        let job = ConfiguredNotification {
            email_to: "ops@example.com".into(),
            whatsapp_to: "+15551234567".into(),
            subject: "Nightly".into(),
            body: "All green".into(),
            media_url: None,
        };

        let receipt = send_configured(&facade, &Ok(job)).await.unwrap();
        assert!(receipt.email.is_some());
        assert!(receipt.whatsapp.is_some());
        assert_eq!(email.sent_count().await, 1);
    }

    #[tokio::test]
    async fn test_send_configured_fails_on_partial_delivery() {
        let facade = facade(
            RecordingEmailTransport::new(),
            RecordingMessagingTransport::failing("authentication failed"),
        );
        let job = ConfiguredNotification {
            email_to: "ops@example.com".into(),
            whatsapp_to: "+15551234567".into(),
            subject: "Nightly".into(),
            body: "All green".into(),
            media_url: None,
        };

        let err = send_configured(&facade, &Ok(job)).await.unwrap_err();
        assert!(format!("{err:?}").contains("authentication failed"));
    }
}
