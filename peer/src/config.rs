//! Runtime settings for a peer

use shared::DEFAULT_MAX_ATTEMPTS;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// How long a single transmission waits for its ACK before retrying
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(500);

/// Outbound messages a room can queue before `send_message` waits
pub const DEFAULT_OUTBOX_CAPACITY: usize = 64;

/// Partially received messages are dropped after this long
pub const DEFAULT_FRAGMENT_MAX_AGE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Address the peer's socket listens on; port 0 picks a free one
    pub bind_addr: SocketAddr,
    pub ack_timeout: Duration,
    /// Total transmissions per frame, the first one included
    pub max_attempts: u32,
    pub outbox_capacity: usize,
    pub fragment_max_age: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            fragment_max_age: DEFAULT_FRAGMENT_MAX_AGE,
        }
    }
}

impl PeerConfig {
    pub fn with_bind_addr(mut self, bind_addr: SocketAddr) -> Self {
        self.bind_addr = bind_addr;
        self
    }

    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Worst case time one frame can keep a room sender busy per host
    pub fn worst_case_delivery(&self) -> Duration {
        self.ack_timeout * self.max_attempts
    }
}
