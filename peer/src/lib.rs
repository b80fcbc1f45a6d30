//! # Chat Peer Library
//!
//! This library is the reliable, room-scoped delivery layer of a serverless
//! chat. Every participant runs the same code: it listens on one UDP socket,
//! sends messages to the other members of the rooms it joined and
//! acknowledges whatever it receives.
//!
//! ## Core Responsibilities
//!
//! ### Room Membership
//! The [`HostRegistry`] maps each room to the remote hosts currently in it.
//! It is seeded by the local user and updated by remote peers (room-change
//! requests, first messages), and handed out as snapshots so a broadcast in
//! progress never observes a half-applied change.
//!
//! ### Reliable Delivery
//! UDP drops and duplicates datagrams, so every frame is sent stop-and-wait:
//! - A [`Notification`] is registered with the [`AckTracker`] before sending
//! - The frame is retransmitted on every ACK timeout, up to a fixed number of attempts
//! - The notification is forgotten once the attempts run out
//!
//! ### Inbound Dispatch
//! A single [`Dispatcher`] task owns the receive side of the socket. ACKs
//! resolve notifications, messages are acknowledged and reassembled, and
//! room-change requests update the registry. Anything undecodable is logged
//! and dropped.
//!
//! ## Architecture Design
//!
//! ### One Task per Room
//! Each joined room has a [`RoomSender`] task with its own queue. A send
//! blocks only that room's task, so a silent host in one room never delays
//! another room. Ending a sender is cooperative: the task finishes the
//! delivery it is working on before it stops.
//!
//! ### Shared Services, No Globals
//! The registry and the tracker are ordinary values behind `Arc`, created by
//! [`Peer::bind`]. Tests build isolated instances of each piece.
//!
//! ## Module Organization
//!
//! - `host`: [`Host`] identity and local-interface detection
//! - `registry`: room to hosts index
//! - `notification`: outstanding ACK bookkeeping
//! - `delivery`: send, wait, retransmit
//! - `dispatcher`: receive loop and [`PeerEvent`]s
//! - `room_sender`: per-room broadcast task
//! - `peer`: the [`Peer`] aggregate tying it together
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use peer::{Host, Peer, PeerConfig, PeerEvent};
//! use shared::RoomId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (peer, mut events) = Peer::bind(PeerConfig::default()).await?;
//!     peer.seed_hosts(["192.168.1.20:5000:3".parse::<Host>()?]);
//!
//!     peer.join_room(RoomId::new(3)).await?;
//!     peer.send_message(RoomId::new(3), "hello").await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let PeerEvent::Message { from, text, .. } = event {
//!             println!("{}: {}", from, text);
//!         }
//!     }
//!
//!     let known_hosts = peer.disconnect().await?;
//!     println!("{} hosts to remember", known_hosts.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod host;
pub mod notification;
pub mod peer;
pub mod registry;
pub mod room_sender;

pub use config::PeerConfig;
pub use delivery::{Delivery, Outcome};
pub use dispatcher::{Dispatcher, PeerEvent};
pub use error::PeerError;
pub use host::{Host, LocalInterfaces, ParseHostError};
pub use notification::{AckTracker, FrameRef, Notification};
pub use peer::Peer;
pub use registry::HostRegistry;
pub use room_sender::{Outbound, Outbox, RoomSender};
