//! Sends the notification described by configuration once, then exits.
//!
//! Run with: cargo run -p relay_api --bin relay_send
//!
//! Reads TO_EMAIL, TO_WHATSAPP, EMAIL_SUBJECT, MESSAGE_BODY and optional MEDIA_URL
//! alongside the usual channel credentials. Exits non-zero unless both channels
//! accepted the message.

use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv};
use domain_notifications::models::SentResponse;
use domain_notifications::{ConfigGap, ConfiguredNotification, NotificationsConfig, build_facade};
use eyre::Result;

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();
    init_tracing(&Environment::from_env());

    let notifications = NotificationsConfig::from_env()?;
    let configured = ConfiguredNotification::from_env().map_err(ConfigGap::from);
    let facade = build_facade(&notifications)?;

    let receipt = relay_api::send_configured(&facade, &configured).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&SentResponse::from(receipt))?
    );
    Ok(())
}
