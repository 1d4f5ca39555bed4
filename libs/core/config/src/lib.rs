pub mod server;
pub mod tracing;

use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is required but not set")]
    MissingEnvVar(String),

    #[error("Environment variables {0:?} are required but not set")]
    MissingEnvVars(Vec<String>),

    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },

    #[error("Environment variables {keys:?} hold invalid values: {details}")]
    InvalidEnvVars { keys: Vec<String>, details: String },
}

/// Application environment (dev = local, prod = deployed relay)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        if app_env.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Name and version of the running binary, reported by `/health`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppInfo {
    pub name: &'static str,
    pub version: &'static str,
}

/// Captures the calling crate's package name and version.
#[macro_export]
macro_rules! app_info {
    () => {
        $crate::AppInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    };
}

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

/// Helper to load and parse environment variable with a default value
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Helper to load and parse environment variable or return error
pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env_optional(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Returns the variable's value, treating unset and blank values alike.
pub fn env_optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses the variable into `T`, falling back to `default` when it is unset.
///
/// A value that is set but does not parse is an error rather than a silent fallback.
pub fn env_parse_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_optional(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::ParseError {
            key: key.to_string(),
            details: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_defaults_to_development() {
        temp_env::with_var_unset("APP_ENV", || {
            let env = Environment::from_env();
            assert_eq!(env, Environment::Development);
            assert!(env.is_development());
            assert!(!env.is_production());
        });
    }

    #[test]
    fn test_environment_production_case_insensitive() {
        temp_env::with_var("APP_ENV", Some("PRODUCTION"), || {
            assert_eq!(Environment::from_env(), Environment::Production);
        });

        temp_env::with_var("APP_ENV", Some("Production"), || {
            assert_eq!(Environment::from_env(), Environment::Production);
        });
    }

    #[test]
    fn test_environment_unknown_defaults_to_development() {
        temp_env::with_var("APP_ENV", Some("staging"), || {
            assert_eq!(Environment::from_env(), Environment::Development);
        });
    }

    #[test]
    fn test_env_or_default_without_value() {
        temp_env::with_var_unset("RELAY_MISSING_VAR", || {
            let result = env_or_default("RELAY_MISSING_VAR", "default_value");
            assert_eq!(result, "default_value");
        });
    }

    #[test]
    fn test_env_required_missing() {
        temp_env::with_var_unset("RELAY_MISSING_REQUIRED", || {
            let err = env_required("RELAY_MISSING_REQUIRED").unwrap_err();
            assert!(err.to_string().contains("RELAY_MISSING_REQUIRED"));
            assert!(err.to_string().contains("required"));
        });
    }

    #[test]
    fn test_env_required_treats_blank_as_missing() {
        temp_env::with_var("RELAY_BLANK_VAR", Some("   "), || {
            assert!(env_required("RELAY_BLANK_VAR").is_err());
            assert_eq!(env_optional("RELAY_BLANK_VAR"), None);
        });
    }

    #[test]
    fn test_env_optional_trims_value() {
        temp_env::with_var("RELAY_PADDED_VAR", Some("  value "), || {
            assert_eq!(env_optional("RELAY_PADDED_VAR").as_deref(), Some("value"));
        });
    }

    #[test]
    fn test_env_parse_or_uses_default_when_unset() {
        temp_env::with_var_unset("RELAY_TIMEOUT", || {
            assert_eq!(env_parse_or("RELAY_TIMEOUT", 30u64).unwrap(), 30);
        });
    }

    #[test]
    fn test_env_parse_or_rejects_garbage() {
        temp_env::with_var("RELAY_TIMEOUT", Some("soon"), || {
            let err = env_parse_or("RELAY_TIMEOUT", 30u64).unwrap_err();
            assert!(matches!(err, ConfigError::ParseError { ref key, .. } if key == "RELAY_TIMEOUT"));
        });
    }

    #[test]
    fn test_missing_env_vars_lists_every_key() {
        let err = ConfigError::MissingEnvVars(vec!["A".into(), "B".into()]);
        let text = err.to_string();
        assert!(text.contains("\"A\""));
        assert!(text.contains("\"B\""));
    }

    #[test]
    fn test_invalid_env_vars_names_keys_and_reason() {
        let err = ConfigError::InvalidEnvVars {
            keys: vec!["TO_EMAIL".into()],
            details: "must be a valid email address".into(),
        };
        let text = err.to_string();
        assert!(text.contains("\"TO_EMAIL\""));
        assert!(text.contains("must be a valid email address"));
    }

    #[test]
    fn test_app_info_macro_captures_package() {
        let info = app_info!();
        assert_eq!(info.name, "core_config");
        assert!(!info.version.is_empty());
    }
}
