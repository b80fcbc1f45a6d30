//! Per-room outbound task
//!
//! A room sender takes messages the local user typed for its room and
//! broadcasts them, fragment by fragment, to every host the registry lists
//! for that room at the moment the message is picked up.

use crate::delivery::{Delivery, Outcome};
use crate::dispatcher::PeerEvent;
use crate::error::PeerError;
use crate::host::{Host, LocalInterfaces};
use crate::registry::HostRegistry;
use log::{debug, error, info, warn};
use shared::{fragment, Frame, RoomId};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Work queued for a room sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message(String),
    /// Tell every known host that we are now in the room
    Announce,
}

/// Source of message ids, unique per peer
#[derive(Debug)]
pub struct MessageIds(AtomicU32);

impl MessageIds {
    /// Starts at a random id so a restarted peer doesn't collide with ids
    /// remote reassemblers still remember
    pub fn random() -> Self {
        Self(AtomicU32::new(rand::random()))
    }

    pub fn starting_at(first: u32) -> Self {
        Self(AtomicU32::new(first))
    }

    pub fn next(&self) -> u32 {
        // fetch_add wraps around on overflow
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// State shared by every room sender of one peer
#[derive(Debug, Clone)]
pub struct SenderContext {
    pub registry: Arc<HostRegistry>,
    pub delivery: Arc<Delivery>,
    pub interfaces: Arc<LocalInterfaces>,
    pub local_port: u32,
    pub max_attempts: u32,
    pub message_ids: Arc<MessageIds>,
    pub events: mpsc::UnboundedSender<PeerEvent>,
}

impl SenderContext {
    fn remote_hosts(&self, hosts: Vec<Host>) -> Vec<Host> {
        hosts
            .into_iter()
            .filter(|h| !h.is_local(&self.interfaces, self.local_port))
            .collect()
    }

    /// Sends one message to everybody currently in `room`
    ///
    /// Returns the number of hosts that received every fragment.
    pub async fn broadcast(&self, room: RoomId, payload: &[u8]) -> usize {
        // membership may have changed since the last message
        let hosts = self.remote_hosts(self.registry.search(room));
        if hosts.is_empty() {
            info!("Nobody else in room {}; message not sent", room);
            return 0;
        }

        let frames = match fragment(room, payload, self.local_port, self.message_ids.next()) {
            Ok(frames) => frames,
            Err(e) => {
                error!("Cannot send message to room {}: {}", room, e);
                return 0;
            }
        };

        let mut delivered = 0;
        for host in &hosts {
            if self.send_all(host, &frames).await {
                delivered += 1;
            } else {
                self.emit(PeerEvent::DeliveryFailed {
                    to: host.clone(),
                    room,
                });
            }
        }

        debug!(
            "Message of {} fragment(s) delivered to {}/{} hosts in room {}",
            frames.len(),
            delivered,
            hosts.len(),
            room
        );
        delivered
    }

    /// Sends the fragments in order; stops at the first one that fails since
    /// the host couldn't reassemble the message anyway
    async fn send_all(&self, host: &Host, frames: &[Frame]) -> bool {
        for frame in frames {
            let outcome = self.delivery.send(host, frame, self.max_attempts).await;
            match outcome {
                Outcome::Acknowledged { .. } => {}
                Outcome::Exhausted { .. } | Outcome::Unreachable => {
                    error!(
                        "Error trying to send message {} fragment {}/{} to {}: {}",
                        frame.message_id,
                        frame.fragment_index + 1,
                        frame.fragment_count,
                        host,
                        outcome
                    );
                    return false;
                }
            }
        }
        true
    }

    /// Sends a room-change request for `room` to every known host, those
    /// already listed in `room` included
    pub async fn announce(&self, room: RoomId) -> usize {
        let hosts = self.remote_hosts(self.registry.all_hosts());

        let mut reached = 0;
        for host in &hosts {
            let request = Frame::room_request(room, self.local_port, self.message_ids.next());
            let outcome = self.delivery.send(host, &request, self.max_attempts).await;
            if outcome.is_acknowledged() {
                reached += 1;
            } else {
                warn!("{} did not answer the request for room {}: {}", host, room, outcome);
            }
        }

        info!("Announced room {} to {}/{} hosts", room, reached, hosts.len());
        reached
    }

    fn emit(&self, event: PeerEvent) {
        if self.events.send(event).is_err() {
            debug!("No event listener; event dropped");
        }
    }
}

/// Cloneable queue into one room sender
///
/// Waiting on a full queue only needs this handle, never the sender itself.
#[derive(Debug, Clone)]
pub struct Outbox {
    room: RoomId,
    queue: mpsc::Sender<Outbound>,
    end: watch::Receiver<bool>,
}

impl Outbox {
    pub fn room(&self) -> RoomId {
        self.room
    }

    /// Queues a message, waiting for space if the queue is full
    pub async fn send(&self, text: impl Into<String>) -> Result<(), PeerError> {
        self.enqueue(Outbound::Message(text.into())).await
    }

    pub async fn announce(&self) -> Result<(), PeerError> {
        self.enqueue(Outbound::Announce).await
    }

    async fn enqueue(&self, outbound: Outbound) -> Result<(), PeerError> {
        if *self.end.borrow() {
            return Err(PeerError::SenderStopped(self.room));
        }
        self.queue
            .send(outbound)
            .await
            .map_err(|_| PeerError::SenderStopped(self.room))
    }
}

/// Handle to the task broadcasting one room's outbound messages
///
/// Lifecycle is one way: running, then ended. Ending is cooperative; the
/// task checks the flag between messages and never abandons a delivery
/// that is already underway.
#[derive(Debug)]
pub struct RoomSender {
    room: RoomId,
    outbox: Outbox,
    end: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RoomSender {
    pub fn spawn(room: RoomId, context: SenderContext, capacity: usize) -> Self {
        let (queue, inbox) = mpsc::channel(capacity.max(1));
        let (end, end_rx) = watch::channel(false);
        let outbox = Outbox {
            room,
            queue,
            end: end_rx.clone(),
        };
        let handle = tokio::spawn(run(room, context, inbox, end_rx));

        info!("Room sender for room {} started", room);
        Self {
            room,
            outbox,
            end,
            handle,
        }
    }

    pub fn room(&self) -> RoomId {
        self.room
    }

    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    /// Queues a message, waiting for space if the queue is full
    pub async fn send(&self, text: impl Into<String>) -> Result<(), PeerError> {
        self.outbox.send(text).await
    }

    pub async fn announce(&self) -> Result<(), PeerError> {
        self.outbox.announce().await
    }

    /// Marks the sender as ended; calling it again has no effect
    pub fn end_execution(&self) {
        self.end.send_replace(true);
    }

    pub fn has_ended(&self) -> bool {
        *self.end.borrow()
    }

    /// Waits for the task to finish, including any delivery in flight
    pub async fn join(self) -> Result<(), PeerError> {
        self.handle.await?;
        Ok(())
    }
}

async fn run(
    room: RoomId,
    context: SenderContext,
    mut inbox: mpsc::Receiver<Outbound>,
    mut end: watch::Receiver<bool>,
) {
    loop {
        if *end.borrow() {
            break;
        }

        let outbound = tokio::select! {
            biased;

            changed = end.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            },

            outbound = inbox.recv() => match outbound {
                Some(outbound) => outbound,
                None => break,
            },
        };

        // not raced against `end`: an in-flight delivery always completes
        match outbound {
            Outbound::Message(text) => {
                context.broadcast(room, text.as_bytes()).await;
            }
            Outbound::Announce => {
                context.announce(room).await;
            }
        }
    }

    info!("Room sender for room {} ended", room);
}
