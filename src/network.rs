//! Network link state shared between the host and the client

use cirrus_core_interface::Connectivity;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// Link flag plus a count of how many times the link has come up
#[derive(Debug, Default)]
pub struct NetworkStatus {
    connected: AtomicBool,
    connections: AtomicU64,
}

impl NetworkStatus {
    /// Start with the link down and no connections seen
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a link-up event, returning the 1-based connection number
    pub fn mark_connected(&self) -> u64 {
        self.connected.store(true, Ordering::SeqCst);
        let count = self.connections.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Network connected (connection #{})", count);
        count
    }

    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        debug!("Network disconnected");
    }

    pub fn connection_count(&self) -> u64 {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Connectivity for NetworkStatus {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_count_increments() {
        let status = NetworkStatus::new();
        assert!(!status.is_connected());
        assert_eq!(status.mark_connected(), 1);
        status.mark_disconnected();
        assert!(!status.is_connected());
        assert_eq!(status.mark_connected(), 2);
        assert!(status.is_connected());
        assert_eq!(status.connection_count(), 2);
    }
}
