//! # Chat Client Library
//!
//! The terminal front-end around a [`peer::Peer`]. The core delivery logic
//! lives in the `peer` crate; this crate only turns what the user types into
//! calls on it and prints what comes back.
//!
//! ## Module Organization
//!
//! ### Commands Module (`commands`)
//! Parses input lines. Lines starting with `/` are commands, matched
//! case-insensitively by any unique prefix (`/j 4` joins room 4). Every other
//! line is a message for the current room.
//!
//! ### Input Module (`input`)
//! Reads lines from stdin (or any async reader in tests).
//!
//! ### Display Module (`display`)
//! Formats incoming messages, room changes, delivery failures and listings.
//!
//! ### Known Hosts Module (`known_hosts`)
//! Loads the hosts remembered from the previous run and stores the registry
//! on exit, bincode-encoded.
//!
//! ### Session Module (`session`)
//! The interactive loop: one current room, input and peer events handled
//! as they arrive, known hosts saved on the way out.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::InputReader;
//! use client::session::Session;
//! use peer::{Peer, PeerConfig};
//! use shared::RoomId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (peer, events) = Peer::bind(PeerConfig::default()).await?;
//!     peer.seed_hosts(client::known_hosts::load("known_hosts")?);
//!
//!     let mut session = Session::new(peer, "known_hosts");
//!     session.switch_room(RoomId::new(1)).await?;
//!     session.run(InputReader::stdin(), events).await
//! }
//! ```

pub mod commands;
pub mod display;
pub mod input;
pub mod known_hosts;
pub mod session;
