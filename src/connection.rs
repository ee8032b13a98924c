// ABOUTME: Client connection handle and readiness polling across occupied slots
// ABOUTME: Reads are non-blocking and only issued after readiness is reported

use std::future::poll_fn;
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::task::{Context, Poll};

use tokio::net::TcpStream;

use crate::slots::SlotTable;

/// Upper bound on buffer-sized reads per readiness report, so one chatty peer
/// cannot hold the loop. Data left behind keeps the socket readable.
const MAX_READS_PER_WAKE: usize = 16;

/// An accepted client connection.
///
/// Dropping the connection closes the socket.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    bytes_received: u64,
    /// Close or error seen after data in the same drain, reported next time
    deferred_end: Option<ReadOutcome>,
}

/// What a single read of a ready connection produced
#[derive(Debug)]
pub enum ReadOutcome {
    /// Bytes were consumed
    Data(usize),
    /// The peer closed its side in an orderly way
    Closed,
    /// Readiness was stale; nothing to read yet
    WouldBlock,
    /// Transport error
    Failed(io::Error),
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            bytes_received: 0,
            deferred_end: None,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Total bytes read from this connection so far
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Read everything currently available without blocking.
    ///
    /// Reads into `buf` until the socket reports would-block, so tokio's
    /// cached readiness is cleared and an idle peer stays quiet. The chunks
    /// are summed into one `Data`. A close or error that follows data in the
    /// same drain is held back and returned by the next call.
    ///
    /// `buf` must not be empty, otherwise a zero-length read would look like
    /// a peer close.
    pub fn read_available(&mut self, buf: &mut [u8]) -> ReadOutcome {
        debug_assert!(!buf.is_empty());

        if let Some(end) = self.deferred_end.take() {
            return end;
        }

        let mut total = 0;
        for _ in 0..MAX_READS_PER_WAKE {
            let end = match self.stream.try_read(buf) {
                Ok(0) => ReadOutcome::Closed,
                Ok(n) => {
                    total += n;
                    continue;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => ReadOutcome::WouldBlock,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => ReadOutcome::Failed(e),
            };

            if total == 0 {
                return end;
            }
            if !matches!(end, ReadOutcome::WouldBlock) {
                self.deferred_end = Some(end);
            }
            break;
        }

        if total == 0 {
            return ReadOutcome::WouldBlock;
        }
        self.bytes_received += total as u64;
        ReadOutcome::Data(total)
    }

    /// Whether a close or error is waiting to be reported
    fn has_deferred_end(&self) -> bool {
        self.deferred_end.is_some()
    }

    fn poll_read_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.stream.poll_read_ready(cx)
    }
}

impl SlotTable<Connection> {
    /// Poll every occupied slot for read readiness.
    ///
    /// Resolves with all slots that are ready at the time of the poll. Stays
    /// pending while the table is empty.
    pub fn poll_readable(&self, cx: &mut Context<'_>) -> Poll<io::Result<Vec<usize>>> {
        let mut ready = Vec::new();

        for (index, conn) in self.iter_occupied() {
            if conn.has_deferred_end() {
                ready.push(index);
                continue;
            }
            match conn.poll_read_ready(cx) {
                Poll::Ready(Ok(())) => ready.push(index),
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => {}
            }
        }

        if ready.is_empty() {
            Poll::Pending
        } else {
            Poll::Ready(Ok(ready))
        }
    }

    /// Wait until at least one occupied slot is readable
    pub async fn readable(&self) -> io::Result<Vec<usize>> {
        poll_fn(|cx| self.poll_readable(cx)).await
    }
}
