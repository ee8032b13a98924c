// ABOUTME: Listening endpoint: create, bind and listen on a fixed IPv4 TCP address
// ABOUTME: Each startup stage maps its failure to a distinct fatal StartupError

use std::io;
use std::net::{SocketAddr, SocketAddrV4};

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, info};

use crate::error::StartupError;

/// Bound, listening TCP socket.
///
/// Created once at startup and closed when dropped.
#[derive(Debug)]
pub struct ListeningEndpoint {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl ListeningEndpoint {
    /// Create the socket, bind `addr` and start listening with `backlog`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(addr: SocketAddrV4, backlog: u32) -> Result<Self, StartupError> {
        let addr = SocketAddr::V4(addr);

        let socket = TcpSocket::new_v4().map_err(StartupError::Create)?;
        socket.set_reuseaddr(true).map_err(StartupError::Create)?;

        socket
            .bind(addr)
            .map_err(|source| StartupError::from_bind(addr, source))?;
        debug!(addr = %addr, "Socket bound");

        let listener = socket
            .listen(backlog)
            .map_err(|source| StartupError::Listen { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| StartupError::Listen { addr, source })?;

        info!(addr = %local_addr, backlog = backlog, "Listening for connections");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address the endpoint is actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept the next pending connection.
    ///
    /// Cancel safe: dropping the future before it completes loses no connection.
    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.listener.accept().await
    }
}
