// ABOUTME: Counters describing what the wait loop has done since startup
//
// Tracks:
// - Connections: accepted, accept failures, displaced by newcomers
// - Resets: notifications handled, connections they closed
// - Reads: bytes received, peer closes, read failures

/// Listener counters.
///
/// Owned and updated by the wait loop only, so plain integers suffice.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ListenerStats {
    pub accepted: u64,
    pub accept_failures: u64,
    pub displaced: u64,
    pub resets: u64,
    pub reset_evictions: u64,
    pub peer_closes: u64,
    pub read_failures: u64,
    pub bytes_received: u64,
}

impl ListenerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_accepted(&mut self, displaced: usize) {
        self.accepted += 1;
        self.displaced += displaced as u64;
    }

    pub fn accept_failed(&mut self) {
        self.accept_failures += 1;
    }

    pub fn reset(&mut self, evicted: usize) {
        self.resets += 1;
        self.reset_evictions += evicted as u64;
    }

    pub fn bytes(&mut self, count: usize) {
        self.bytes_received += count as u64;
    }

    pub fn peer_closed(&mut self) {
        self.peer_closes += 1;
    }

    pub fn read_failed(&mut self) {
        self.read_failures += 1;
    }

    /// Connections closed by the listener rather than by their peers
    pub fn evictions(&self) -> u64 {
        self.displaced + self.reset_evictions
    }
}
