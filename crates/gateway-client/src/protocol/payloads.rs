//! Control-plane payload definitions
//!
//! Payloads for the handshake and the client-originated operations.

use gateway_common::SecretToken;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload for op 10 (Hello)
///
/// Sent by the server immediately after connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

/// Payload for op 2 (Identify)
///
/// Starts a new session.
#[derive(Debug, Clone, Serialize)]
pub struct IdentifyPayload {
    pub token: SecretToken,

    pub properties: IdentifyProperties,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub intents: Option<u64>,
}

/// Client connection properties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyProperties {
    /// Operating system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    /// Browser or client name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,

    /// Device type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl IdentifyProperties {
    /// Create empty properties
    #[must_use]
    pub fn new() -> Self {
        Self {
            os: None,
            browser: None,
            device: None,
        }
    }

    /// Properties describing this build
    #[must_use]
    pub fn current(client_name: &str) -> Self {
        Self::new()
            .with_os(std::env::consts::OS)
            .with_browser(client_name)
            .with_device(client_name)
    }

    /// Set operating system
    #[must_use]
    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }

    /// Set browser
    #[must_use]
    pub fn with_browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = Some(browser.into());
        self
    }

    /// Set device type
    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload for op 6 (Resume)
///
/// Re-attaches to a previously established session.
#[derive(Debug, Clone, Serialize)]
pub struct ResumePayload {
    pub token: SecretToken,

    pub session_id: String,

    /// Last sequence number received
    pub seq: u64,
}

/// Payload for op 3 (Status Update)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdatePayload {
    /// New status (online, idle, dnd, invisible, offline)
    pub status: String,

    /// Unix time in milliseconds since the client went idle
    pub since: Option<u64>,

    #[serde(default)]
    pub activities: Vec<Value>,

    #[serde(default)]
    pub afk: bool,
}

impl StatusUpdatePayload {
    /// Valid status values
    pub const VALID_STATUSES: &'static [&'static str] =
        &["online", "idle", "dnd", "invisible", "offline"];

    /// Status with no activity and not AFK
    #[must_use]
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            since: None,
            activities: Vec::new(),
            afk: false,
        }
    }

    /// Check if the status is valid
    #[must_use]
    pub fn is_valid_status(&self) -> bool {
        Self::VALID_STATUSES.contains(&self.status.as_str())
    }
}
