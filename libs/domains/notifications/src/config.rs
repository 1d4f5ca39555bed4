//! Environment-backed configuration for the relay.
//!
//! Everything here is read once at process start. Missing channel credentials are
//! not a startup failure: the gap is recorded and reported on the first request that
//! needs that channel. Malformed numeric settings are rejected immediately.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use core_config::{ConfigError, FromEnv, env_optional, env_or_default, env_parse_or};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::models::NotificationRequest;

pub const EMAIL_SENDER: &str = "EMAIL_SENDER";
pub const EMAIL_PASSWORD: &str = "EMAIL_PASSWORD";
pub const TWILIO_ACCOUNT_SID: &str = "TWILIO_ACCOUNT_SID";
pub const TWILIO_AUTH_TOKEN: &str = "TWILIO_AUTH_TOKEN";
pub const TWILIO_MESSAGING_SERVICE_SID: &str = "TWILIO_MESSAGING_SERVICE_SID";
pub const TWILIO_WHATSAPP_FROM: &str = "TWILIO_WHATSAPP_FROM";
pub const TO_EMAIL: &str = "TO_EMAIL";
pub const TO_WHATSAPP: &str = "TO_WHATSAPP";
pub const EMAIL_SUBJECT: &str = "EMAIL_SUBJECT";
pub const MESSAGE_BODY: &str = "MESSAGE_BODY";
pub const MEDIA_URL: &str = "MEDIA_URL";
pub const RELAY_MODE: &str = "RELAY_MODE";

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MEDIA_MAX_BYTES: u64 = 25 * 1024 * 1024;

/// Names of the settings a channel or job is missing or holds invalid values for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigGap {
    pub keys: Vec<String>,
}

impl ConfigGap {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for ConfigGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keys.join(", "))
    }
}

impl From<ConfigError> for ConfigGap {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::MissingEnvVar(key) => ConfigGap::new([key]),
            ConfigError::MissingEnvVars(keys) => ConfigGap::new(keys),
            ConfigError::ParseError { key, .. } => ConfigGap::new([key]),
            ConfigError::InvalidEnvVars { keys, .. } => ConfigGap::new(keys),
        }
    }
}

/// Reads every key, reporting all of the missing ones at once.
fn required_all<const N: usize>(keys: [&str; N]) -> Result<[String; N], ConfigError> {
    let values = keys.map(env_optional);
    let missing: Vec<String> = keys
        .iter()
        .zip(values.iter())
        .filter(|(_, value)| value.is_none())
        .map(|(key, _)| key.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(ConfigError::MissingEnvVars(missing));
    }
    Ok(values.map(Option::unwrap_or_default))
}

/// Sender account used for SMTP authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct EmailCredentials {
    sender: String,
    password: String,
}

impl EmailCredentials {
    pub fn new(sender: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            password: password.into(),
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for EmailCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailCredentials")
            .field("sender", &self.sender)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl FromEnv for EmailCredentials {
    fn from_env() -> Result<Self, ConfigError> {
        let [sender, password] = required_all([EMAIL_SENDER, EMAIL_PASSWORD])?;
        Ok(Self::new(sender, password))
    }
}

/// Twilio account used for WhatsApp delivery.
///
/// At least one of `messaging_service_sid` or `from` is always present.
#[derive(Clone, PartialEq, Eq)]
pub struct MessagingCredentials {
    account_sid: String,
    auth_token: String,
    messaging_service_sid: Option<String>,
    from: Option<String>,
}

impl MessagingCredentials {
    pub fn with_service(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        messaging_service_sid: impl Into<String>,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            messaging_service_sid: Some(messaging_service_sid.into()),
            from: None,
        }
    }

    pub fn with_sender(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            messaging_service_sid: None,
            from: Some(from.into()),
        }
    }

    /// Adds a sender number alongside the messaging service.
    pub fn and_sender(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn account_sid(&self) -> &str {
        &self.account_sid
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    pub fn messaging_service_sid(&self) -> Option<&str> {
        self.messaging_service_sid.as_deref()
    }

    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }
}

impl fmt::Debug for MessagingCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagingCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("messaging_service_sid", &self.messaging_service_sid)
            .field("from", &self.from)
            .finish()
    }
}

impl FromEnv for MessagingCredentials {
    fn from_env() -> Result<Self, ConfigError> {
        let [account_sid, auth_token] = required_all([TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN])?;
        let messaging_service_sid = env_optional(TWILIO_MESSAGING_SERVICE_SID);
        let from = env_optional(TWILIO_WHATSAPP_FROM);

        if messaging_service_sid.is_none() && from.is_none() {
            return Err(ConfigError::MissingEnvVar(
                TWILIO_MESSAGING_SERVICE_SID.to_string(),
            ));
        }

        Ok(Self {
            account_sid,
            auth_token,
            messaging_service_sid,
            from,
        })
    }
}

/// A complete notification described entirely by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredNotification {
    pub email_to: String,
    pub whatsapp_to: String,
    pub subject: String,
    pub body: String,
    pub media_url: Option<String>,
}

impl ConfiguredNotification {
    pub fn to_request(&self) -> NotificationRequest {
        NotificationRequest::both(
            &self.email_to,
            &self.subject,
            &self.whatsapp_to,
            &self.body,
            self.media_url.clone(),
        )
    }
}

impl FromEnv for ConfiguredNotification {
    fn from_env() -> Result<Self, ConfigError> {
        let [email_to, whatsapp_to, subject, body] =
            required_all([TO_EMAIL, TO_WHATSAPP, EMAIL_SUBJECT, MESSAGE_BODY])?;
        let job = Self {
            email_to,
            whatsapp_to,
            subject,
            body,
            media_url: env_optional(MEDIA_URL),
        };

        job.to_request()
            .validate()
            .map_err(|errors| ConfigError::InvalidEnvVars {
                keys: invalid_settings(&errors),
                details: errors.to_string(),
            })?;
        Ok(job)
    }
}

/// Maps request validation failures back to the settings that produced them.
fn invalid_settings(errors: &ValidationErrors) -> Vec<String> {
    let fields = errors.errors();
    let mut keys = Vec::new();

    if let Some(ValidationErrorsKind::Struct(email)) = fields.get("email") {
        if email.errors().contains_key("to") {
            keys.push(TO_EMAIL.to_string());
        }
        if email.errors().contains_key("subject") {
            keys.push(EMAIL_SUBJECT.to_string());
        }
    }
    for (field, key) in [
        ("whatsapp_to", TO_WHATSAPP),
        ("body", MESSAGE_BODY),
        ("media_url", MEDIA_URL),
    ] {
        if fields.contains_key(field) {
            keys.push(key.to_string());
        }
    }
    keys
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_SMTP_HOST.to_string(),
            port: DEFAULT_SMTP_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl FromEnv for SmtpSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or_default("SMTP_HOST", DEFAULT_SMTP_HOST),
            port: env_parse_or("SMTP_PORT", DEFAULT_SMTP_PORT)?,
            timeout: Duration::from_secs(env_parse_or("SMTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwilioSettings {
    pub api_base: String,
    pub timeout: Duration,
}

impl Default for TwilioSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_TWILIO_API_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl FromEnv for TwilioSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: env_or_default("TWILIO_API_BASE", DEFAULT_TWILIO_API_BASE),
            timeout: Duration::from_secs(env_parse_or(
                "TWILIO_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSettings {
    pub timeout: Duration,
    pub max_bytes: u64,
    /// Parent of the per-file temporary directories; the system temp dir when unset
    pub temp_root: Option<PathBuf>,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_bytes: DEFAULT_MEDIA_MAX_BYTES,
            temp_root: None,
        }
    }
}

impl FromEnv for MediaSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            timeout: Duration::from_secs(env_parse_or(
                "MEDIA_FETCH_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
            max_bytes: env_parse_or("MEDIA_MAX_BYTES", DEFAULT_MEDIA_MAX_BYTES)?,
            temp_root: env_optional("MEDIA_TEMP_DIR").map(PathBuf::from),
        })
    }
}

/// Where the content of a `/send-message` dispatch comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMode {
    /// Recipients and content come from the request body.
    RequestSourced,
    /// Recipients and content were loaded from configuration at startup.
    ConfigurationSourced(Result<ConfiguredNotification, ConfigGap>),
}

impl RelayMode {
    pub fn is_configuration_sourced(&self) -> bool {
        matches!(self, RelayMode::ConfigurationSourced(_))
    }
}

/// The `RELAY_MODE` setting before the configured job is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayModeKind {
    #[default]
    Request,
    Config,
}

impl FromStr for RelayModeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "request" => Ok(RelayModeKind::Request),
            "config" | "configuration" => Ok(RelayModeKind::Config),
            other => Err(format!(
                "unknown relay mode '{other}', expected 'request' or 'config'"
            )),
        }
    }
}

impl fmt::Display for RelayModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayModeKind::Request => write!(f, "request"),
            RelayModeKind::Config => write!(f, "config"),
        }
    }
}

impl FromEnv for RelayMode {
    fn from_env() -> Result<Self, ConfigError> {
        let mode = match env_optional(RELAY_MODE) {
            Some(raw) => raw.parse().map_err(|details| ConfigError::ParseError {
                key: RELAY_MODE.to_string(),
                details,
            })?,
            None => RelayModeKind::default(),
        };

        Ok(match mode {
            RelayModeKind::Request => RelayMode::RequestSourced,
            RelayModeKind::Config => RelayMode::ConfigurationSourced(
                ConfiguredNotification::from_env().map_err(ConfigGap::from),
            ),
        })
    }
}

/// Everything the notifications domain reads from the environment.
#[derive(Debug, Clone)]
pub struct NotificationsConfig {
    pub email: Result<EmailCredentials, ConfigGap>,
    pub messaging: Result<MessagingCredentials, ConfigGap>,
    pub smtp: SmtpSettings,
    pub twilio: TwilioSettings,
    pub media: MediaSettings,
    pub mode: RelayMode,
}

impl FromEnv for NotificationsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            email: EmailCredentials::from_env().map_err(ConfigGap::from),
            messaging: MessagingCredentials::from_env().map_err(ConfigGap::from),
            smtp: SmtpSettings::from_env()?,
            twilio: TwilioSettings::from_env()?,
            media: MediaSettings::from_env()?,
            mode: RelayMode::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREDENTIAL_KEYS: [&str; 6] = [
        EMAIL_SENDER,
        EMAIL_PASSWORD,
        TWILIO_ACCOUNT_SID,
        TWILIO_AUTH_TOKEN,
        TWILIO_MESSAGING_SERVICE_SID,
        TWILIO_WHATSAPP_FROM,
    ];

    #[test]
    fn test_email_credentials_report_every_missing_key() {
        temp_env::with_vars_unset([EMAIL_SENDER, EMAIL_PASSWORD], || {
            let gap = ConfigGap::from(EmailCredentials::from_env().unwrap_err());
            assert_eq!(gap.keys, vec![EMAIL_SENDER, EMAIL_PASSWORD]);
        });
    }

    #[test]
    fn test_email_credentials_loaded() {
        temp_env::with_vars(
            [
                (EMAIL_SENDER, Some("relay@example.com")),
                (EMAIL_PASSWORD, Some("app-password")),
            ],
            || {
                let creds = EmailCredentials::from_env().unwrap();
                assert_eq!(creds.sender(), "relay@example.com");
                assert_eq!(creds.password(), "app-password");
            },
        );
    }

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let email = EmailCredentials::new("relay@example.com", "hunter2");
        let messaging = MessagingCredentials::with_service("AC123", "tok-secret", "MG456");
        assert!(!format!("{email:?}").contains("hunter2"));
        assert!(!format!("{messaging:?}").contains("tok-secret"));
        assert!(format!("{messaging:?}").contains("AC123"));
    }

    #[test]
    fn test_messaging_credentials_need_service_or_sender() {
        temp_env::with_vars(
            [
                (TWILIO_ACCOUNT_SID, Some("AC123")),
                (TWILIO_AUTH_TOKEN, Some("token")),
                (TWILIO_MESSAGING_SERVICE_SID, None),
                (TWILIO_WHATSAPP_FROM, None),
            ],
            || {
                let gap = ConfigGap::from(MessagingCredentials::from_env().unwrap_err());
                assert_eq!(gap.keys, vec![TWILIO_MESSAGING_SERVICE_SID]);
            },
        );
    }

    #[test]
    fn test_messaging_credentials_with_sender_only() {
        temp_env::with_vars(
            [
                (TWILIO_ACCOUNT_SID, Some("AC123")),
                (TWILIO_AUTH_TOKEN, Some("token")),
                (TWILIO_MESSAGING_SERVICE_SID, None),
                (TWILIO_WHATSAPP_FROM, Some("+14155238886")),
            ],
            || {
                let creds = MessagingCredentials::from_env().unwrap();
                assert_eq!(creds.from(), Some("+14155238886"));
                assert_eq!(creds.messaging_service_sid(), None);
            },
        );
    }

    #[test]
    fn test_missing_credentials_do_not_fail_startup() {
        temp_env::with_vars(
            CREDENTIAL_KEYS
                .iter()
                .map(|k| (*k, None::<&str>))
                .chain([(RELAY_MODE, None)])
                .collect::<Vec<_>>(),
            || {
                let config = NotificationsConfig::from_env().unwrap();
                assert!(config.email.is_err());
                assert!(config.messaging.is_err());
                assert_eq!(config.mode, RelayMode::RequestSourced);
            },
        );
    }

    #[test]
    fn test_malformed_port_fails_startup() {
        temp_env::with_var("SMTP_PORT", Some("five-eight-seven"), || {
            let err = SmtpSettings::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::ParseError { ref key, .. } if key == "SMTP_PORT"));
        });
    }

    #[test]
    fn test_settings_defaults() {
        temp_env::with_vars_unset(
            [
                "SMTP_HOST",
                "SMTP_PORT",
                "SMTP_TIMEOUT_SECS",
                "TWILIO_API_BASE",
                "TWILIO_TIMEOUT_SECS",
                "MEDIA_FETCH_TIMEOUT_SECS",
                "MEDIA_MAX_BYTES",
                "MEDIA_TEMP_DIR",
            ],
            || {
                assert_eq!(SmtpSettings::from_env().unwrap(), SmtpSettings::default());
                assert_eq!(TwilioSettings::from_env().unwrap(), TwilioSettings::default());
                assert_eq!(MediaSettings::from_env().unwrap(), MediaSettings::default());
            },
        );
    }

    #[test]
    fn test_media_temp_root_from_env() {
        temp_env::with_var("MEDIA_TEMP_DIR", Some("/var/tmp/relay"), || {
            let settings = MediaSettings::from_env().unwrap();
            assert_eq!(settings.temp_root, Some(PathBuf::from("/var/tmp/relay")));
        });
    }

    #[test]
    fn test_configuration_sourced_mode_loads_job() {
        temp_env::with_vars(
            [
                (RELAY_MODE, Some("config")),
                (TO_EMAIL, Some("ops@example.com")),
                (TO_WHATSAPP, Some("+15550001111")),
                (EMAIL_SUBJECT, Some("Nightly report")),
                (MESSAGE_BODY, Some("All green")),
                (MEDIA_URL, None),
            ],
            || {
                let RelayMode::ConfigurationSourced(Ok(job)) = RelayMode::from_env().unwrap()
                else {
                    panic!("expected a loaded configured notification");
                };
                assert_eq!(job.email_to, "ops@example.com");
                assert_eq!(job.media_url, None);
            },
        );
    }

    #[test]
    fn test_configuration_sourced_mode_records_gap() {
        temp_env::with_vars(
            [
                (RELAY_MODE, Some("configuration")),
                (TO_EMAIL, Some("ops@example.com")),
                (TO_WHATSAPP, None),
                (EMAIL_SUBJECT, Some("Nightly report")),
                (MESSAGE_BODY, None),
            ],
            || {
                let mode = RelayMode::from_env().unwrap();
                assert_eq!(
                    mode,
                    RelayMode::ConfigurationSourced(Err(ConfigGap::new([
                        TO_WHATSAPP,
                        MESSAGE_BODY
                    ])))
                );
            },
        );
    }

    #[test]
    fn test_configuration_sourced_mode_rejects_invalid_values() {
        temp_env::with_vars(
            [
                (RELAY_MODE, Some("config")),
                (TO_EMAIL, Some("not-an-email")),
                (TO_WHATSAPP, Some("call-me")),
                (EMAIL_SUBJECT, Some("Nightly report")),
                (MESSAGE_BODY, Some("All green")),
                (MEDIA_URL, Some("ftp://files.example.com/report.pdf")),
            ],
            || {
                let mode = RelayMode::from_env().unwrap();
                assert_eq!(
                    mode,
                    RelayMode::ConfigurationSourced(Err(ConfigGap::new([
                        TO_EMAIL,
                        TO_WHATSAPP,
                        MEDIA_URL
                    ])))
                );
            },
        );
    }

    #[test]
    fn test_unknown_relay_mode_is_rejected() {
        temp_env::with_var(RELAY_MODE, Some("batch"), || {
            assert!(matches!(
                RelayMode::from_env(),
                Err(ConfigError::ParseError { .. })
            ));
        });
    }
}
