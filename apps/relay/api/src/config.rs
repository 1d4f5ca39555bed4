use axum::http::HeaderValue;
use axum_helpers::parse_allowed_origins;
use core_config::{AppInfo, FromEnv, app_info, env_optional, server::ServerConfig};
use domain_notifications::NotificationsConfig;
use eyre::WrapErr;

// Re-export Environment for use in other modules
pub use core_config::Environment;

/// Application-specific configuration
/// Composes shared config components from the `config` library
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub server: ServerConfig,
    pub environment: Environment,
    pub notifications: NotificationsConfig,
    pub allowed_origins: Vec<HeaderValue>,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let server = ServerConfig::from_env()?; // Uses defaults: HOST=0.0.0.0, PORT=8080
        let notifications = NotificationsConfig::from_env()?; // Missing credentials surface per request
        let allowed_origins = match env_optional("CORS_ALLOWED_ORIGIN") {
            Some(raw) => parse_allowed_origins(&raw).wrap_err("Invalid CORS_ALLOWED_ORIGIN")?,
            None => Vec::new(),
        };

        Ok(Self {
            app: app_info!(),
            server,
            environment,
            notifications,
            allowed_origins,
        })
    }
}
