//! Gateway envelope and codec
//!
//! Every frame on the wire is a JSON object `{op, d, s, t}`. Decoding is
//! structural only: the `d` payload stays untyped until the router knows which
//! event it carries.

use super::OpCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A decoded gateway frame
///
/// Immutable once decoded; use the accessors to read it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    op: OpCode,

    #[serde(default)]
    d: Value,

    #[serde(default)]
    s: Option<u64>,

    #[serde(default)]
    t: Option<String>,
}

impl Envelope {
    /// Operation code
    #[must_use]
    pub fn op(&self) -> OpCode {
        self.op
    }

    /// Raw payload (`Value::Null` when absent)
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.d
    }

    /// Take ownership of the raw payload
    #[must_use]
    pub fn into_data(self) -> Value {
        self.d
    }

    /// Server-assigned sequence number (dispatch only)
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.s
    }

    /// Event name (dispatch only)
    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        self.t.as_deref()
    }

    /// Short description used as the dispatch queue label
    #[must_use]
    pub fn label(&self) -> String {
        match (&self.t, self.s) {
            (Some(t), Some(s)) => format!("{t}#{s}"),
            (Some(t), None) => t.clone(),
            _ => self.op.name().to_string(),
        }
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "Envelope(op={}, t={t}", self.op)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "Envelope(op={})", self.op)
        }
    }
}

/// Outbound frame; client frames never carry `s` or `t`
#[derive(Serialize)]
struct Outbound<'a, T: ?Sized> {
    op: OpCode,
    d: &'a T,
}

/// Frame could not be decoded into an envelope
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, or not an object with a numeric `op`
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Dispatch frame without an event name
    #[error("Dispatch envelope is missing its event name")]
    MissingEventName,
}

/// Outbound payload could not be serialized
#[derive(Debug, Error)]
#[error("Failed to encode {op} payload: {source}")]
pub struct EncodeError {
    pub op: OpCode,
    #[source]
    pub source: serde_json::Error,
}

/// Decode one raw frame
///
/// Unknown op codes and unknown fields are accepted.
pub fn decode(raw: &str) -> Result<Envelope, DecodeError> {
    let envelope: Envelope = serde_json::from_str(raw)?;

    if envelope.op == OpCode::Dispatch && envelope.t.is_none() {
        return Err(DecodeError::MissingEventName);
    }

    Ok(envelope)
}

/// Encode an outbound frame
pub fn encode<T>(op: OpCode, data: &T) -> Result<String, EncodeError>
where
    T: Serialize + ?Sized,
{
    serde_json::to_string(&Outbound { op, d: data }).map_err(|source| EncodeError { op, source })
}
