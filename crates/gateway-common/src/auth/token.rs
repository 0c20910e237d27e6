//! Gateway credential token
//!
//! The token is sent verbatim inside Identify and Resume payloads but must never
//! appear in logs. `Debug` and `Display` only ever show a short prefix.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Number of leading characters kept when redacting
const VISIBLE_PREFIX: usize = 4;

/// Opaque authentication token for the gateway
#[derive(Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(transparent)]
pub struct SecretToken(String);

impl SecretToken {
    /// Wrap a raw token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Access the raw token (only for building outbound payloads)
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if the token is empty or whitespace
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Redacted form safe for logs
    #[must_use]
    pub fn redacted(&self) -> String {
        if self.0.chars().count() <= VISIBLE_PREFIX {
            return "***".to_string();
        }
        let prefix: String = self.0.chars().take(VISIBLE_PREFIX).collect();
        format!("{prefix}***")
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretToken").field(&self.redacted()).finish()
    }
}

impl fmt::Display for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

// The wire format needs the real value
impl Serialize for SecretToken {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl From<String> for SecretToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for SecretToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}
