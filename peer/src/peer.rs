use crate::config::PeerConfig;
use crate::delivery::Delivery;
use crate::dispatcher::{Dispatcher, PeerEvent};
use crate::error::PeerError;
use crate::host::{Host, LocalInterfaces};
use crate::notification::AckTracker;
use crate::registry::HostRegistry;
use crate::room_sender::{MessageIds, RoomSender, SenderContext};
use log::{info, warn};
use shared::{check_message_len, RoomId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

/// One chat participant: a bound socket, its receive loop and a sender per
/// joined room
///
/// All shared state lives behind `Arc`s, so the front-end can keep using
/// [`Peer::registry`] while messages are in flight.
pub struct Peer {
    config: PeerConfig,
    local_addr: SocketAddr,
    context: SenderContext,
    senders: Mutex<HashMap<RoomId, RoomSender>>,
    shutdown: watch::Sender<bool>,
    dispatcher: JoinHandle<()>,
}

impl Peer {
    /// Binds the socket and starts receiving
    ///
    /// The returned receiver yields every [`PeerEvent`]; dropping it only
    /// discards events, the peer keeps acknowledging traffic.
    pub async fn bind(
        config: PeerConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PeerEvent>), PeerError> {
        let socket = Arc::new(UdpSocket::bind(config.bind_addr).await?);
        let local_addr = socket.local_addr()?;
        let local_port = u32::from(local_addr.port());
        let interfaces = LocalInterfaces::discover(local_addr).await;

        let tracker = Arc::new(AckTracker::new());
        let registry = Arc::new(HostRegistry::new());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let dispatcher = Dispatcher::new(
            Arc::clone(&socket),
            local_port,
            Arc::clone(&tracker),
            Arc::clone(&registry),
            events_tx.clone(),
            config.fragment_max_age,
        );
        let dispatcher = tokio::spawn(dispatcher.run(shutdown_rx));

        let context = SenderContext {
            registry,
            delivery: Arc::new(Delivery::new(socket, tracker, config.ack_timeout)),
            interfaces: Arc::new(interfaces),
            local_port,
            max_attempts: config.max_attempts,
            message_ids: Arc::new(MessageIds::random()),
            events: events_tx,
        };

        info!("Peer bound to {}", local_addr);
        let peer = Self {
            config,
            local_addr,
            context,
            senders: Mutex::new(HashMap::new()),
            shutdown,
            dispatcher,
        };
        Ok((peer, events_rx))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn local_port(&self) -> u32 {
        self.context.local_port
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<HostRegistry> {
        &self.context.registry
    }

    pub fn tracker(&self) -> &Arc<AckTracker> {
        self.context.delivery.tracker()
    }

    /// Adds known hosts, skipping this peer's own address
    pub fn seed_hosts(&self, hosts: impl IntoIterator<Item = Host>) -> usize {
        let local_port = self.local_port();
        let interfaces = Arc::clone(&self.context.interfaces);
        self.registry()
            .seed(hosts.into_iter().filter(|h| !h.is_local(&interfaces, local_port)))
    }

    /// Starts a sender for `room` and announces the join to every known host
    pub async fn join_room(&self, room: RoomId) -> Result<(), PeerError> {
        if room.is_reserved() {
            return Err(PeerError::ReservedRoom(room));
        }

        let mut senders = self.senders.lock().await;
        if senders.contains_key(&room) {
            return Err(PeerError::AlreadyJoined(room));
        }

        let sender = RoomSender::spawn(room, self.context.clone(), self.config.outbox_capacity);
        sender.announce().await?;
        senders.insert(room, sender);

        info!("Joined room {}", room);
        Ok(())
    }

    /// Queues `text` for everybody in `room`
    ///
    /// Returns once the message is queued, not once it is delivered; failures
    /// come back as [`PeerEvent::DeliveryFailed`]. A full queue delays only
    /// this call, other rooms stay usable meanwhile.
    pub async fn send_message(
        &self,
        room: RoomId,
        text: impl Into<String>,
    ) -> Result<(), PeerError> {
        let text = text.into();
        check_message_len(text.len())?;

        let outbox = self
            .senders
            .lock()
            .await
            .get(&room)
            .map(RoomSender::outbox)
            .ok_or(PeerError::NotJoined(room))?;
        outbox.send(text).await
    }

    /// Stops the room's sender and lets its current delivery finish
    ///
    /// The registry is left alone: the room's hosts stay known for the next
    /// announcement and for the known-hosts export.
    pub async fn leave_room(&self, room: RoomId) -> Result<(), PeerError> {
        let sender = self
            .senders
            .lock()
            .await
            .remove(&room)
            .ok_or(PeerError::NotJoined(room))?;

        sender.end_execution();
        sender.join().await?;

        info!("Left room {}", room);
        Ok(())
    }

    /// Rooms with a running sender, ascending
    pub async fn joined_rooms(&self) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self.senders.lock().await.keys().copied().collect();
        rooms.sort();
        rooms
    }

    pub async fn is_joined(&self, room: RoomId) -> bool {
        self.senders.lock().await.contains_key(&room)
    }

    /// Shuts the peer down and returns every host it knew about
    ///
    /// Senders are ended first and awaited, so deliveries already underway
    /// still get their ACKs. The receive loop is stopped last and awaited
    /// before the socket is released.
    pub async fn disconnect(self) -> Result<Vec<Host>, PeerError> {
        let senders: Vec<RoomSender> = self.senders.into_inner().into_values().collect();
        for sender in &senders {
            sender.end_execution();
        }
        for sender in senders {
            let room = sender.room();
            if let Err(e) = sender.join().await {
                warn!("Sender for room {} did not stop cleanly: {}", room, e);
            }
        }

        self.shutdown.send_replace(true);
        self.dispatcher.await?;

        let hosts = self.context.registry.all_hosts();
        info!("Peer on {} disconnected, {} known hosts", self.local_addr, hosts.len());
        Ok(hosts)
    }
}
