//! Reliable send: transmit, wait for the ACK, retransmit, give up
//!
//! Delivery is stop-and-wait per (host, frame). The caller is blocked until
//! the frame is acknowledged or every attempt has timed out, so the next
//! fragment for the same host is never on the wire before the previous one
//! is settled.

use crate::host::Host;
use crate::notification::{AckTracker, FrameRef, Notification};
use log::{debug, warn};
use shared::{ControlKind, Frame};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Result of one reliable send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The ACK arrived after `attempts` transmissions
    Acknowledged { attempts: u32 },
    /// No ACK after `attempts` transmissions
    Exhausted { attempts: u32 },
    /// The host's port can't be addressed over UDP; nothing was sent
    Unreachable,
}

impl Outcome {
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, Outcome::Acknowledged { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Outcome::Acknowledged { attempts } | Outcome::Exhausted { attempts } => *attempts,
            Outcome::Unreachable => 0,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Acknowledged { attempts } => {
                write!(f, "acknowledged after {} attempt(s)", attempts)
            }
            Outcome::Exhausted { attempts } => {
                write!(f, "no acknowledgment after {} attempt(s)", attempts)
            }
            Outcome::Unreachable => write!(f, "host port is not a valid UDP port"),
        }
    }
}

/// Sends frames over the peer's socket and waits for their ACKs
#[derive(Debug)]
pub struct Delivery {
    socket: Arc<UdpSocket>,
    tracker: Arc<AckTracker>,
    ack_timeout: Duration,
}

impl Delivery {
    pub fn new(socket: Arc<UdpSocket>, tracker: Arc<AckTracker>, ack_timeout: Duration) -> Self {
        Self {
            socket,
            tracker,
            ack_timeout,
        }
    }

    pub fn tracker(&self) -> &Arc<AckTracker> {
        &self.tracker
    }

    /// Delivers `frame` to `host`, transmitting it at most `max_attempts` times
    ///
    /// The notification is keyed on the frame's room, which for room
    /// broadcasts is the host's room. It is registered once and reused for
    /// every retransmission; when all attempts time out it is forgotten, so a
    /// very late ACK finds nothing to resolve.
    pub async fn send(&self, host: &Host, frame: &Frame, max_attempts: u32) -> Outcome {
        let Some(addr) = host.socket_addr() else {
            warn!("Cannot send to {}: port out of range", host);
            return Outcome::Unreachable;
        };

        if max_attempts == 0 {
            return Outcome::Exhausted { attempts: 0 };
        }

        let notification = Notification::new(addr, frame.room, ControlKind::Ack);
        let mut acked = self
            .tracker
            .register_for(notification, FrameRef::of(frame));
        let datagram = frame.encode();

        for attempt in 1..=max_attempts {
            match self.socket.send_to(&datagram, addr).await {
                Ok(_) => debug!(
                    "Sent {:?} message {} fragment {}/{} to {} (attempt {}/{})",
                    frame.kind,
                    frame.message_id,
                    frame.fragment_index + 1,
                    frame.fragment_count,
                    addr,
                    attempt,
                    max_attempts
                ),
                Err(e) => {
                    warn!("Failed to send to {} (attempt {}): {}", addr, attempt, e);
                    continue;
                }
            }

            match timeout(self.ack_timeout, &mut acked).await {
                Ok(Ok(())) => return Outcome::Acknowledged { attempts: attempt },
                Ok(Err(_)) => {
                    // the notification was dropped from the tracker by someone else
                    warn!("Notification for {} vanished while waiting", addr);
                    return Outcome::Exhausted { attempts: attempt };
                }
                Err(_) => debug!("No ACK from {} within {:?}", addr, self.ack_timeout),
            }
        }

        if self.tracker.forget(&notification) {
            Outcome::Exhausted {
                attempts: max_attempts,
            }
        } else {
            // resolved between the last timeout and forget
            Outcome::Acknowledged {
                attempts: max_attempts,
            }
        }
    }
}
