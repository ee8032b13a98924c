// ABOUTME: Listener configuration: bind address, port, slot capacity and read buffer size
//
// Defines ListenerConfig with the tunables of the listener:
// - Endpoint: IPv4 bind address and fixed port
// - Slot table capacity (also used as the listen backlog)
// - Size of the buffer used for each non-blocking read

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::error::ConfigError;

/// Port the listener binds when none is given
pub const DEFAULT_PORT: u16 = 1234;

/// Number of concurrently held client connections
pub const DEFAULT_CAPACITY: usize = 1;

/// Bytes consumed per read of a ready connection
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Configuration for the listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Address the listening socket binds to
    pub bind_addr: Ipv4Addr,

    /// Port the listening socket binds to (0 picks an ephemeral port)
    pub port: u16,

    /// Slot table capacity
    pub capacity: usize,

    /// Read buffer size in bytes
    pub read_buffer_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_addr: Ipv4Addr::UNSPECIFIED,
            port: DEFAULT_PORT,
            capacity: DEFAULT_CAPACITY,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl ListenerConfig {
    /// Socket address of the listening endpoint
    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.bind_addr, self.port)
    }

    /// Listen backlog, equal to the slot table capacity
    pub fn backlog(&self) -> u32 {
        u32::try_from(self.capacity).unwrap_or(u32::MAX)
    }

    /// Check the configuration before any socket is created
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.read_buffer_size == 0 {
            return Err(ConfigError::ZeroReadBuffer);
        }
        Ok(())
    }
}
