// ABOUTME: Single-threaded wait loop multiplexing the listener, client slots and reset latch
// ABOUTME: Dispatches resets, accepts and reads with reset > accept > data priority

//! Multiplexed wait loop.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Server                             │
//! │                                                              │
//! │   ResetLatch ─────┐                                          │
//! │   (SIGHUP)        │                                          │
//! │                   ▼                                          │
//! │   Endpoint ──▶ select! (biased) ──▶ reset  → evict all       │
//! │   (accept)        ▲                 accept → install         │
//! │                   │                 data   → read / clear    │
//! │   SlotTable ──────┘                                          │
//! │   (readable)                                                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each call to [`Server::turn`] builds the readiness set, suspends in a
//! single `select!`, and dispatches whatever woke it. The select is the only
//! suspension point; accepts and reads run only after readiness is reported.
//!
//! # Usage
//!
//! ```ignore
//! let latch = ResetLatch::new();
//! forward_hangup(latch.handle())?;
//! let server = Server::bind(&ListenerConfig::default(), latch)?;
//! server.run().await?;
//! ```

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

use crate::config::ListenerConfig;
use crate::connection::{Connection, ReadOutcome};
use crate::endpoint::ListeningEndpoint;
use crate::error::ServerError;
use crate::reset::{ResetHandle, ResetLatch};
use crate::slots::{Installed, SlotTable};
use crate::stats::ListenerStats;

// === Turn Outcomes ===

/// What a single turn of the loop did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// A reset was pending; every slot was emptied
    Reset { evicted: usize },

    /// The latch woke the loop but no reset was pending
    Spurious,

    /// A new client took a slot, evicting `displaced` previous clients
    Accepted {
        slot: usize,
        peer: SocketAddr,
        displaced: usize,
    },

    /// Accepting failed; no connection was added
    AcceptFailed { kind: io::ErrorKind },

    /// The connection was accepted but the table had no slot for it
    Rejected { peer: SocketAddr },

    /// One event per slot that was reported readable
    Read(Vec<SlotEvent>),
}

/// Result of reading one ready slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotEvent {
    /// Bytes were received and counted
    Received { slot: usize, bytes: usize },

    /// The peer closed the connection; the slot is empty now
    Closed { slot: usize },

    /// Reading failed; the slot is empty now
    Failed { slot: usize, kind: io::ErrorKind },

    /// Readiness turned out to be stale; the slot is unchanged
    NotReady { slot: usize },
}

/// Source that ended the wait
enum Wake {
    Reset,
    Incoming(io::Result<(TcpStream, SocketAddr)>),
    Readable(io::Result<Vec<usize>>),
}

// === Server ===

/// Listener holding at most `capacity` clients, reset on demand.
pub struct Server {
    endpoint: ListeningEndpoint,
    slots: SlotTable<Connection>,
    latch: ResetLatch,
    read_buf: Vec<u8>,
    stats: ListenerStats,
}

impl Server {
    /// Validate `config` and open the listening endpoint.
    ///
    /// The backlog equals the slot capacity. Must be called from within a
    /// tokio runtime.
    pub fn bind(config: &ListenerConfig, latch: ResetLatch) -> Result<Self, ServerError> {
        config.validate()?;
        let endpoint = ListeningEndpoint::open(config.socket_addr(), config.backlog())?;

        Ok(Self {
            endpoint,
            slots: SlotTable::new(config.capacity),
            latch,
            read_buf: vec![0; config.read_buffer_size],
            stats: ListenerStats::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    /// Handle for requesting a reset of all connections
    pub fn reset_handle(&self) -> ResetHandle {
        self.latch.handle()
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Number of clients currently held
    pub fn occupied(&self) -> usize {
        self.slots.occupied()
    }

    /// Peer address of every occupied slot
    pub fn peers(&self) -> Vec<(usize, SocketAddr)> {
        self.slots
            .iter_occupied()
            .map(|(slot, conn)| (slot, conn.peer()))
            .collect()
    }

    pub fn stats(&self) -> ListenerStats {
        self.stats
    }

    /// Run the loop until a fatal error.
    ///
    /// Before returning the error every client connection is closed; the
    /// endpoint closes when `self` is dropped.
    pub async fn run(mut self) -> Result<(), ServerError> {
        info!(
            addr = %self.local_addr(),
            capacity = self.capacity(),
            "Listener loop started"
        );

        loop {
            if let Err(err) = self.turn().await {
                return Err(self.shut_down(err));
            }
        }
    }

    /// Close every client after a fatal error and hand the error back
    fn shut_down(&mut self, err: ServerError) -> ServerError {
        let evicted = self.evict_all("shutdown");
        error!(
            error = %err,
            fatal = err.is_fatal(),
            evicted = evicted,
            total_evictions = self.stats.evictions() + evicted as u64,
            "Fatal listener error, shutting down"
        );
        err
    }

    /// Wait for the next readiness and dispatch it.
    ///
    /// A pending reset wins over accepting, and accepting wins over reading,
    /// so a connection is never read in the turn that installed it.
    ///
    /// The priority is strict. With capacity above 1, a steady stream of
    /// incoming connections keeps winning the select and reads on the other
    /// occupied slots wait until the backlog is empty. With capacity 1 every
    /// accept evicts the only reader anyway.
    pub async fn turn(&mut self) -> Result<Turn, ServerError> {
        trace!(
            occupied = self.slots.occupied(),
            reset_pending = self.latch.is_pending(),
            "Waiting for readiness"
        );

        let wake = tokio::select! {
            biased;
            () = self.latch.notified() => Wake::Reset,
            accepted = self.endpoint.accept() => Wake::Incoming(accepted),
            ready = self.slots.readable() => Wake::Readable(ready),
        };

        match wake {
            Wake::Reset => Ok(self.handle_reset()),
            Wake::Incoming(Ok((stream, peer))) => Ok(self.handle_accept(stream, peer)),
            Wake::Incoming(Err(e)) => {
                warn!(error = %e, "New connection accepting error");
                self.stats.accept_failed();
                Ok(Turn::AcceptFailed { kind: e.kind() })
            }
            Wake::Readable(Ok(ready)) => {
                let events = ready
                    .into_iter()
                    .map(|slot| self.handle_read(slot))
                    .collect();
                Ok(Turn::Read(events))
            }
            Wake::Readable(Err(e)) => Err(ServerError::Wait(e)),
        }
    }

    fn handle_reset(&mut self) -> Turn {
        if !self.latch.consume_pending() {
            debug!("Reset latch woke without a pending reset");
            return Turn::Spurious;
        }

        let evicted = self.evict_all("reset");
        self.stats.reset(evicted);
        info!(
            evicted = evicted,
            total_evictions = self.stats.evictions(),
            "Reset handled, all connections closed"
        );

        Turn::Reset { evicted }
    }

    fn handle_accept(&mut self, stream: TcpStream, peer: SocketAddr) -> Turn {
        info!(peer = %peer, "New connection accepted");

        match self.slots.try_install(Connection::new(stream, peer)) {
            Ok(Installed { index, displaced }) => {
                for (slot, old) in &displaced {
                    info!(
                        slot = slot,
                        peer = %old.peer(),
                        bytes = old.bytes_received(),
                        "Closing connection to make room for new client"
                    );
                }
                let displaced = displaced.len();
                self.stats.connection_accepted(displaced);
                debug!(slot = index, peer = %peer, "Connection installed");

                Turn::Accepted {
                    slot: index,
                    peer,
                    displaced,
                }
            }
            Err(conn) => {
                warn!(peer = %conn.peer(), "No slot available, dropping connection");
                Turn::Rejected { peer }
            }
        }
    }

    fn handle_read(&mut self, slot: usize) -> SlotEvent {
        let Some(conn) = self.slots.get_mut(slot) else {
            return SlotEvent::NotReady { slot };
        };
        let peer = conn.peer();
        let outcome = conn.read_available(&mut self.read_buf);
        let total = conn.bytes_received();

        match outcome {
            ReadOutcome::Data(bytes) => {
                self.stats.bytes(bytes);
                info!(slot = slot, peer = %peer, bytes = bytes, "Bytes received from client");
                SlotEvent::Received { slot, bytes }
            }
            ReadOutcome::Closed => {
                self.slots.clear(slot);
                self.stats.peer_closed();
                info!(slot = slot, peer = %peer, total_bytes = total, "Connection closed by client");
                SlotEvent::Closed { slot }
            }
            ReadOutcome::Failed(e) => {
                self.slots.clear(slot);
                self.stats.read_failed();
                warn!(slot = slot, peer = %peer, error = %e, "Error reading from client");
                SlotEvent::Failed {
                    slot,
                    kind: e.kind(),
                }
            }
            ReadOutcome::WouldBlock => {
                trace!(slot = slot, "Spurious readiness");
                SlotEvent::NotReady { slot }
            }
        }
    }

    /// Close every client connection, logging each one
    fn evict_all(&mut self, reason: &'static str) -> usize {
        let evicted = self.slots.evict_all();
        for (slot, conn) in &evicted {
            info!(
                slot = slot,
                peer = %conn.peer(),
                bytes = conn.bytes_received(),
                reason = reason,
                "Closing client connection"
            );
        }
        evicted.len()
    }
}
