// ABOUTME: Library crate for solo-listener exposing the wait loop and its building blocks
//
// Key components:
// - reset: latch turning SIGHUP (or any producer) into a loop wakeup
// - endpoint: listening TCP socket with fatal startup errors
// - slots: fixed-capacity client table with evict-all-on-overflow policy
// - connection: client handle and slot readiness polling
// - server: the multiplexed wait loop

#![allow(missing_docs)]

pub mod cli;
pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod reset;
pub mod server;
pub mod slots;
pub mod stats;

// Re-exports for convenient access
pub use config::ListenerConfig;
pub use error::{ConfigError, ServerError, StartupError};
pub use reset::{ResetHandle, ResetLatch, forward_hangup};
pub use server::{Server, SlotEvent, Turn};
