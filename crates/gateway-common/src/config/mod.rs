//! Configuration structs

mod client_config;

pub use client_config::{
    AppSettings, AuthSettings, CacheSettings, ClientConfig, ConfigError, Environment,
    GatewaySettings, HeartbeatSettings, ReconnectSettings,
};
