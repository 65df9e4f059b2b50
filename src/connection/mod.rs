//! Connection Module
//!
//! Connection lifecycle: initial connect, health checks and backoff-based
//! reconnection.

mod backoff;
mod manager;

pub use backoff::{BackoffPolicy, BACKOFF_BASE};
pub use manager::{ConnectionManager, ConnectionState, Sleeper};
