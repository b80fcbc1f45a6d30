//! Inbound side: the single receive loop of a peer

use crate::host::Host;
use crate::notification::{AckTracker, FrameRef, Notification};
use crate::registry::HostRegistry;
use log::{debug, error, info, warn};
use shared::{ControlKind, Frame, Reassembler, RoomId, MAX_DATAGRAM_LEN};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};

/// Everything the receive loop hands to the front-end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// A complete message arrived
    Message {
        from: Host,
        room: RoomId,
        text: String,
    },
    /// A host asked to be placed in `room` (the reserved room: no preference)
    RoomChangeRequested { from: Host, room: RoomId },
    /// A message could not be delivered to one host of a room
    DeliveryFailed { to: Host, room: RoomId },
}

/// Owns the receiving half of the socket and demultiplexes frames
pub struct Dispatcher {
    socket: Arc<UdpSocket>,
    local_port: u32,
    tracker: Arc<AckTracker>,
    registry: Arc<HostRegistry>,
    events: mpsc::UnboundedSender<PeerEvent>,
    reassembler: Reassembler,
    fragment_max_age: Duration,
}

impl Dispatcher {
    pub fn new(
        socket: Arc<UdpSocket>,
        local_port: u32,
        tracker: Arc<AckTracker>,
        registry: Arc<HostRegistry>,
        events: mpsc::UnboundedSender<PeerEvent>,
        fragment_max_age: Duration,
    ) -> Self {
        Self {
            socket,
            local_port,
            tracker,
            registry,
            events,
            reassembler: Reassembler::default(),
            fragment_max_age,
        }
    }

    /// Receives until `shutdown` turns true (or its sender goes away)
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut buffer = [0u8; MAX_DATAGRAM_LEN];
        let mut purge = tokio::time::interval(self.fragment_max_age);

        info!("Dispatcher listening on port {}", self.local_port);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                },

                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, from)) => self.handle_datagram(&buffer[..len], from).await,
                        Err(e) => {
                            error!("Error receiving datagram: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                },

                _ = purge.tick() => {
                    let dropped = self.reassembler.purge_older_than(self.fragment_max_age);
                    if dropped > 0 {
                        warn!("Dropped {} incomplete messages", dropped);
                    }
                },
            }
        }

        info!("Dispatcher on port {} stopped", self.local_port);
    }

    /// Decodes one datagram and acts on it; bad input is logged and dropped
    pub async fn handle_datagram(&mut self, data: &[u8], from: SocketAddr) {
        match Frame::decode(data) {
            Ok(frame) => self.handle_frame(frame, from).await,
            Err(e) => warn!("Dropping malformed datagram from {}: {}", from, e),
        }
    }

    async fn handle_frame(&mut self, frame: Frame, from: SocketAddr) {
        let sender = Host::new(from.ip(), frame.source_port, frame.room);

        match frame.kind {
            ControlKind::Ack => {
                let Some(addr) = sender.socket_addr() else {
                    warn!("ACK from {} names invalid port {}", from, frame.source_port);
                    return;
                };
                let notification = Notification::new(addr, frame.room, ControlKind::Ack);
                if self.tracker.resolve_ack(&notification, FrameRef::of(&frame)) {
                    debug!(
                        "ACK from {} for message {} fragment {}",
                        addr, frame.message_id, frame.fragment_index
                    );
                } else {
                    debug!("Ignoring unsolicited ACK from {}", addr);
                }
            }

            ControlKind::Plain => {
                self.acknowledge(&frame, from).await;

                if let Some(payload) = self.reassembler.accept(from, &frame) {
                    self.learn(&sender);
                    let text = String::from_utf8_lossy(&payload).into_owned();
                    self.emit(PeerEvent::Message {
                        from: sender,
                        room: frame.room,
                        text,
                    });
                }
            }

            ControlKind::ChangeRoomRequest => {
                self.acknowledge(&frame, from).await;

                // retransmitted requests pass through the reassembler as duplicates
                if self.reassembler.accept(from, &frame).is_none() {
                    return;
                }
                if !frame.room.is_reserved() {
                    self.registry.relocate(sender.clone());
                }
                self.emit(PeerEvent::RoomChangeRequested {
                    from: sender,
                    room: frame.room,
                });
            }
        }
    }

    /// Records the sender of a message so replies can reach it; hosts
    /// already known keep the room they have
    fn learn(&self, sender: &Host) {
        let known = self.registry.find(sender.ip(), sender.port()).is_some();
        if known || sender.room().is_reserved() {
            return;
        }
        if self.registry.insert(sender.clone()) {
            info!("Learned {} from its message", sender);
        }
    }

    async fn acknowledge(&self, frame: &Frame, to: SocketAddr) {
        let ack = Frame::ack_for(frame, self.local_port);
        if let Err(e) = self.socket.send_to(&ack.encode(), to).await {
            error!("Failed to acknowledge frame from {}: {}", to, e);
        }
    }

    fn emit(&self, event: PeerEvent) {
        if self.events.send(event).is_err() {
            debug!("No event listener; event dropped");
        }
    }
}
