//! Gateway protocol definitions
//!
//! Op codes, the envelope codec, control-plane payloads, and close codes.

mod close_codes;
mod envelope;
mod opcodes;
mod payloads;

pub use close_codes::{CloseAction, CloseCode};
pub use envelope::{decode, encode, DecodeError, EncodeError, Envelope};
pub use opcodes::OpCode;
pub use payloads::{
    HelloPayload, IdentifyPayload, IdentifyProperties, ResumePayload, StatusUpdatePayload,
};
