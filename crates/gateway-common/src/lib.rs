//! # gateway-common
//!
//! Shared utilities for the gateway client: configuration, credential handling, and telemetry.

pub mod auth;
pub mod config;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::SecretToken;
pub use config::{
    AppSettings, AuthSettings, CacheSettings, ClientConfig, ConfigError, Environment,
    GatewaySettings, HeartbeatSettings, ReconnectSettings,
};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
