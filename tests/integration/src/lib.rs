//! Integration test utilities for the gateway client
//!
//! This crate provides helpers for driving a client against the scripted
//! in-memory gateway and against a local WebSocket server.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
