//! Ordered dispatch
//!
//! Serializes the handling of inbound frames for one connection attempt.

mod queue;

pub use queue::{DispatchQueue, FaultSink, HandlerFault, QueueError, UnitOfWork};
