//! Gateway close codes and the client's reaction to them

use serde::{Deserialize, Serialize};

/// Close codes the gateway uses when it drops the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    UnknownError = 4000,
    UnknownOpcode = 4001,
    DecodeError = 4002,
    NotAuthenticated = 4003,
    AuthenticationFailed = 4004,
    AlreadyAuthenticated = 4005,
    InvalidSequence = 4007,
    RateLimited = 4008,
    SessionTimeout = 4009,
    InvalidShard = 4010,
    ShardingRequired = 4011,
    InvalidApiVersion = 4012,
    InvalidIntents = 4013,
    DisallowedIntents = 4014,
}

/// What the connection loop does after a close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    /// Reconnect and resume the current session if there is one
    Resume,
    /// Reconnect with a fresh identify; the old session is gone
    Identify,
    /// Stop; retrying cannot succeed without new credentials or settings
    Stop,
}

impl CloseCode {
    const ALL: [Self; 14] = [
        Self::UnknownError,
        Self::UnknownOpcode,
        Self::DecodeError,
        Self::NotAuthenticated,
        Self::AuthenticationFailed,
        Self::AlreadyAuthenticated,
        Self::InvalidSequence,
        Self::RateLimited,
        Self::SessionTimeout,
        Self::InvalidShard,
        Self::ShardingRequired,
        Self::InvalidApiVersion,
        Self::InvalidIntents,
        Self::DisallowedIntents,
    ];

    /// Gateway code for a raw value; `None` for plain WebSocket codes
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_u16() == value)
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    #[must_use]
    pub const fn action(self) -> CloseAction {
        match self {
            Self::AuthenticationFailed
            | Self::InvalidShard
            | Self::ShardingRequired
            | Self::InvalidApiVersion
            | Self::InvalidIntents
            | Self::DisallowedIntents => CloseAction::Stop,
            Self::InvalidSequence | Self::SessionTimeout => CloseAction::Identify,
            _ => CloseAction::Resume,
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "gateway hit an unknown error",
            Self::UnknownOpcode => "client sent an unknown op code",
            Self::DecodeError => "client sent a payload the gateway could not decode",
            Self::NotAuthenticated => "client sent a payload before identifying",
            Self::AuthenticationFailed => "token was rejected",
            Self::AlreadyAuthenticated => "client identified twice",
            Self::InvalidSequence => "resume sequence was invalid",
            Self::RateLimited => "client sent payloads too quickly",
            Self::SessionTimeout => "session timed out",
            Self::InvalidShard => "shard configuration was invalid",
            Self::ShardingRequired => "gateway requires sharding",
            Self::InvalidApiVersion => "gateway version is invalid or outdated",
            Self::InvalidIntents => "intents bitmask was invalid",
            Self::DisallowedIntents => "intents are not enabled for this account",
        }
    }
}

impl CloseAction {
    /// Reaction to a raw close code; anything unrecognised (or no code) resumes
    #[must_use]
    pub fn for_code(code: Option<u16>) -> Self {
        code.and_then(CloseCode::from_u16)
            .map_or(Self::Resume, CloseCode::action)
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({self:?}): {}", self.as_u16(), self.description())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
