//! Client configuration structs
//!
//! Loads configuration from environment variables, falling back to defaults
//! for everything except the credential token.

use crate::auth::SecretToken;
use serde::Deserialize;
use std::env;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub app: AppSettings,
    pub gateway: GatewaySettings,
    pub auth: AuthSettings,
    pub heartbeat: HeartbeatSettings,
    pub reconnect: ReconnectSettings,
    pub cache: CacheSettings,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Remote gateway endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_gateway_url")]
    pub url: String,
    #[serde(default = "default_gateway_version")]
    pub version: u8,
    /// Intents bitmask sent with Identify, omitted when `None`
    #[serde(default)]
    pub intents: Option<u64>,
    /// Capacity of the notification broadcast channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl GatewaySettings {
    /// Full connect URL including the protocol query string
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}/?v={}&encoding=json",
            self.url.trim_end_matches('/'),
            self.version
        )
    }
}

/// Credential settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub token: SecretToken,
}

/// Heartbeat policy
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeartbeatSettings {
    /// Outstanding heartbeats tolerated before forcing a reconnect.
    /// `None` leaves liveness detection to the transport.
    #[serde(default)]
    pub max_missed: Option<u32>,
}

/// Reconnection and invalid-session backoff windows
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectSettings {
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default = "default_invalid_session_min_ms")]
    pub invalid_session_min_ms: u64,
    #[serde(default = "default_invalid_session_max_ms")]
    pub invalid_session_max_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            invalid_session_min_ms: default_invalid_session_min_ms(),
            invalid_session_max_ms: default_invalid_session_max_ms(),
        }
    }
}

/// Entity cache sizing
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_messages_per_channel")]
    pub messages_per_channel: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            messages_per_channel: default_messages_per_channel(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "gateway-client".to_string()
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg".to_string()
}

fn default_gateway_version() -> u8 {
    9
}

fn default_event_buffer() -> usize {
    256
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_invalid_session_min_ms() -> u64 {
    1_000
}

fn default_invalid_session_max_ms() -> u64 {
    5_000
}

fn default_messages_per_channel() -> usize {
    100
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(None),
    }
}

impl ClientConfig {
    /// Build a configuration with defaults and the given token
    #[must_use]
    pub fn new(token: impl Into<SecretToken>) -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: Environment::default(),
            },
            gateway: GatewaySettings {
                url: default_gateway_url(),
                version: default_gateway_version(),
                intents: None,
                event_buffer: default_event_buffer(),
            },
            auth: AuthSettings {
                token: token.into(),
            },
            heartbeat: HeartbeatSettings::default(),
            reconnect: ReconnectSettings::default(),
            cache: CacheSettings::default(),
        }
    }

    /// Override the gateway base URL
    #[must_use]
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway.url = url.into();
        self
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `GATEWAY_TOKEN` is missing or a numeric variable does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let token = env::var("GATEWAY_TOKEN").map_err(|_| ConfigError::MissingVar("GATEWAY_TOKEN"))?;

        let config = Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| Environment::parse(&s))
                    .unwrap_or_default(),
            },
            gateway: GatewaySettings {
                url: env::var("GATEWAY_URL").unwrap_or_else(|_| default_gateway_url()),
                version: parse_var("GATEWAY_VERSION")?.unwrap_or_else(default_gateway_version),
                intents: parse_var("GATEWAY_INTENTS")?,
                event_buffer: parse_var("GATEWAY_EVENT_BUFFER")?.unwrap_or_else(default_event_buffer),
            },
            auth: AuthSettings {
                token: SecretToken::new(token),
            },
            heartbeat: HeartbeatSettings {
                max_missed: parse_var("HEARTBEAT_MAX_MISSED")?,
            },
            reconnect: ReconnectSettings {
                backoff_base_ms: parse_var("RECONNECT_BACKOFF_BASE_MS")?
                    .unwrap_or_else(default_backoff_base_ms),
                backoff_max_ms: parse_var("RECONNECT_BACKOFF_MAX_MS")?
                    .unwrap_or_else(default_backoff_max_ms),
                invalid_session_min_ms: parse_var("INVALID_SESSION_MIN_MS")?
                    .unwrap_or_else(default_invalid_session_min_ms),
                invalid_session_max_ms: parse_var("INVALID_SESSION_MAX_MS")?
                    .unwrap_or_else(default_invalid_session_max_ms),
            },
            cache: CacheSettings {
                messages_per_channel: parse_var("MESSAGE_CACHE_SIZE")?
                    .unwrap_or_else(default_messages_per_channel),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the client relies on
    ///
    /// # Errors
    /// Returns the first violated constraint
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.token.is_empty() {
            return Err(ConfigError::MissingToken);
        }

        let url = self.gateway.url.as_str();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::InvalidValue("GATEWAY_URL", url.to_string()));
        }

        let reconnect = &self.reconnect;
        if reconnect.invalid_session_min_ms == 0
            || reconnect.invalid_session_min_ms > reconnect.invalid_session_max_ms
        {
            return Err(ConfigError::InvalidValue(
                "INVALID_SESSION_MIN_MS",
                format!(
                    "{}..{}",
                    reconnect.invalid_session_min_ms, reconnect.invalid_session_max_ms
                ),
            ));
        }

        if reconnect.backoff_base_ms == 0 || reconnect.backoff_base_ms > reconnect.backoff_max_ms {
            return Err(ConfigError::InvalidValue(
                "RECONNECT_BACKOFF_BASE_MS",
                format!("{}..{}", reconnect.backoff_base_ms, reconnect.backoff_max_ms),
            ));
        }

        if self.gateway.event_buffer == 0 {
            return Err(ConfigError::InvalidValue("GATEWAY_EVENT_BUFFER", "0".to_string()));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Gateway token must not be empty")]
    MissingToken,

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
