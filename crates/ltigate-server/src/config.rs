//! Server configuration.
//!
//! Configuration is read from a TOML file plus `LTIGATE_`-prefixed
//! environment variables (double underscore as section separator, so
//! `LTIGATE_HTTP__PORT=9000` overrides `[http] port`).
//!
//! ```toml
//! [http]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [validation]
//! nonce_window_secs = 300
//! future_skew_secs = 60
//! store_timeout_ms = 5000
//!
//! [[consumers]]
//! key = "moodle"
//! secret = "sesame"
//! name = "Campus Moodle"
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use ltigate_auth::{
    ConsumerCredential, InMemoryConsumerStore, NonceWindow, ValidatorConfig,
};

/// Errors raised while loading or checking the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file or environment sources could not be read or deserialized.
    #[error("failed to read configuration: {0}")]
    Read(#[from] config::ConfigError),

    /// The configuration deserialized but is not usable.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// Description of the problem.
        message: String,
    },
}

impl ConfigError {
    /// Creates a new `Invalid` error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// Listener settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Validation pipeline settings.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Registered tool consumers.
    #[serde(default)]
    pub consumers: Vec<ConsumerEntry>,
}

impl ServerConfig {
    /// Checks cross-field constraints the deserializer cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate consumer keys, empty keys/secrets, or
    /// an unusable replay window.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // A non-positive window (or negative skew) would refuse every
        // launch's timestamp; catch the misconfiguration at startup.
        if self.validation.nonce_window_secs <= 0 {
            return Err(ConfigError::invalid(format!(
                "nonce_window_secs must be positive, got {}",
                self.validation.nonce_window_secs
            )));
        }
        if self.validation.future_skew_secs < 0 {
            return Err(ConfigError::invalid(format!(
                "future_skew_secs must not be negative, got {}",
                self.validation.future_skew_secs
            )));
        }
        let mut keys = std::collections::HashSet::new();
        for consumer in &self.consumers {
            if consumer.key.trim().is_empty() {
                return Err(ConfigError::invalid("consumer key must not be empty"));
            }
            if consumer.secret.is_empty() {
                return Err(ConfigError::invalid(format!(
                    "consumer '{}' has an empty secret",
                    consumer.key
                )));
            }
            if !keys.insert(consumer.key.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "duplicate consumer key '{}'",
                    consumer.key
                )));
            }
        }
        Ok(())
    }

    /// Builds the in-memory consumer store from the configured entries.
    #[must_use]
    pub fn consumer_store(&self) -> InMemoryConsumerStore {
        let store = InMemoryConsumerStore::new();
        for entry in &self.consumers {
            let mut credential =
                ConsumerCredential::new(&entry.key, &entry.secret).with_enabled(entry.enabled);
            if let Some(name) = &entry.name {
                credential = credential.with_name(name);
            }
            store.register(credential);
        }
        store
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Validation pipeline settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Maximum accepted age of an `oauth_timestamp`, in seconds.
    #[serde(default = "default_nonce_window_secs")]
    pub nonce_window_secs: i64,

    /// Allowance for timestamps ahead of the local clock, in seconds.
    #[serde(default = "default_future_skew_secs")]
    pub future_skew_secs: i64,

    /// Budget for each storage collaborator call, in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

impl ValidationConfig {
    /// Converts into the validator's configuration type.
    #[must_use]
    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig::default()
            .with_nonce_window(NonceWindow::new(self.nonce_window_secs, self.future_skew_secs))
            .with_store_timeout(Duration::from_millis(self.store_timeout_ms))
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            nonce_window_secs: default_nonce_window_secs(),
            future_skew_secs: default_future_skew_secs(),
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

/// One registered tool consumer.
#[derive(Clone, Deserialize)]
pub struct ConsumerEntry {
    /// Consumer key, unique across entries.
    pub key: String,

    /// Shared secret. Never logged; the `Debug` impl redacts it.
    pub secret: String,

    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Disabled consumers are rejected as unknown.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl fmt::Debug for ConsumerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerEntry")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .finish()
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_nonce_window_secs() -> i64 {
    300
}

fn default_future_skew_secs() -> i64 {
    60
}

fn default_store_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

/// Loads the configuration from a TOML file and the environment.
///
/// When `path` is `None` the default `ltigate.toml` is used and may be
/// absent; an explicitly requested file must exist.
///
/// # Errors
///
/// Returns an error when sources cannot be read or the result fails
/// [`ServerConfig::validate`].
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name("ltigate").required(false),
    };
    let settings = config::Config::builder()
        .add_source(file)
        .add_source(config::Environment::with_prefix("LTIGATE").separator("__"))
        .build()?;
    let cfg: ServerConfig = settings.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.http.host, "127.0.0.1");
        assert_eq!(cfg.http.port, 8080);
        assert_eq!(cfg.validation.nonce_window_secs, 300);
        assert_eq!(cfg.validation.future_skew_secs, 60);
        assert_eq!(cfg.validation.store_timeout_ms, 5000);
        assert!(cfg.consumers.is_empty());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_full_config_parses() {
        let cfg: ServerConfig = toml::from_str(
            r#"
            [http]
            host = "0.0.0.0"
            port = 9000

            [validation]
            nonce_window_secs = 120
            store_timeout_ms = 250

            [[consumers]]
            key = "moodle"
            secret = "sesame"
            name = "Campus Moodle"

            [[consumers]]
            key = "legacy"
            secret = "old"
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.http.port, 9000);
        assert_eq!(cfg.validation.nonce_window_secs, 120);
        assert_eq!(cfg.validation.future_skew_secs, 60);
        assert_eq!(cfg.consumers.len(), 2);
        assert!(cfg.consumers[0].enabled);
        assert!(!cfg.consumers[1].enabled);
        assert!(cfg.validate().is_ok());

        let validator_config = cfg.validation.validator_config();
        assert_eq!(validator_config.nonce_window.max_age_secs, 120);
        assert_eq!(validator_config.store_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_duplicate_consumer_key_rejected() {
        let cfg: ServerConfig = toml::from_str(
            r#"
            [[consumers]]
            key = "moodle"
            secret = "a"

            [[consumers]]
            key = "moodle"
            secret = "b"
            "#,
        )
        .unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate consumer key"));
    }

    #[test]
    fn test_non_positive_nonce_window_rejected() {
        for bad in ["0", "-300"] {
            let cfg: ServerConfig = toml::from_str(&format!(
                "[validation]\nnonce_window_secs = {bad}\n"
            ))
            .unwrap();
            let err = cfg.validate().unwrap_err();
            assert!(err.to_string().contains("nonce_window_secs"));
        }
    }

    #[test]
    fn test_negative_future_skew_rejected() {
        let cfg: ServerConfig = toml::from_str("[validation]\nfuture_skew_secs = -1\n").unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("future_skew_secs"));

        // Zero skew is a legitimate strict setting.
        let cfg: ServerConfig = toml::from_str("[validation]\nfuture_skew_secs = 0\n").unwrap();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_empty_secret_rejected() {
        let cfg: ServerConfig = toml::from_str(
            r#"
            [[consumers]]
            key = "moodle"
            secret = ""
            "#,
        )
        .unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_consumer_entry_debug_redacts_secret() {
        let cfg: ServerConfig = toml::from_str(
            r#"
            [[consumers]]
            key = "moodle"
            secret = "hunter2"
            "#,
        )
        .unwrap();
        let rendered = format!("{:?}", cfg.consumers[0]);
        assert!(!rendered.contains("hunter2"));
    }
}
