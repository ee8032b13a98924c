// ABOUTME: Error taxonomy for the listener: configuration, startup and wait-loop failures
// ABOUTME: Transient accept/read failures are reported as loop outcomes, not errors

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

// === Configuration Errors ===

/// Rejected listener configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The slot table must hold at least one connection
    #[error("Capacity must be at least 1")]
    ZeroCapacity,

    /// Reads need a non-empty buffer to tell data from a peer close
    #[error("Read buffer size must be at least 1 byte")]
    ZeroReadBuffer,
}

// === Startup Errors ===

/// Failures while opening the listening endpoint.
///
/// All of these are fatal: a fixed port that cannot be bound will not fix
/// itself, so the process exits instead of retrying.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The transport could not allocate a socket
    #[error("Failed to create listening socket: {0}")]
    Create(#[source] io::Error),

    /// Another socket already listens on the address
    #[error("Address {addr} is already in use")]
    AddressInUse {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Binding the address needs privileges the process does not have
    #[error("Permission denied binding {addr}")]
    PermissionDenied {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Any other bind failure
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The bound socket could not be put into listening state
    #[error("Failed to listen on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

impl StartupError {
    /// Classify a bind failure by its I/O error kind
    pub fn from_bind(addr: SocketAddr, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::AddrInUse => Self::AddressInUse { addr, source },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { addr, source },
            _ => Self::Bind { addr, source },
        }
    }
}

// === Server Errors ===

/// Errors that end the listener.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The listening endpoint could not be opened
    #[error(transparent)]
    Startup(#[from] StartupError),

    /// Waiting for readiness failed; the loop cannot continue without it
    #[error("Readiness wait failed: {0}")]
    Wait(#[source] io::Error),
}

impl ServerError {
    /// Whether the listener has to stop.
    ///
    /// Always true: transient accept and read failures are reported as
    /// [`Turn`](crate::server::Turn) values and never become a `ServerError`.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) | Self::Startup(_) | Self::Wait(_) => true,
        }
    }

    /// Whether the error happened before the loop started serving
    pub fn is_startup(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Startup(_))
    }
}
