//! Room membership tracking for the local peer
//!
//! This module keeps the index from room to the remote hosts currently in it:
//! - Insertion and removal as peers join, move or leave
//! - Snapshot lookups so a broadcast in progress never sees a half-updated room
//! - Enumeration of populated rooms across the whole room domain
//! - Bulk seeding and export for the known-hosts file
//!
//! The registry is shared between the inbound dispatcher (which moves hosts
//! when they request a room change), every room sender (which re-reads its
//! room before each message) and the front-end.

use crate::host::Host;
use log::{debug, info};
use shared::RoomId;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe index from room to the hosts currently in it
///
/// Each room keeps its hosts in insertion order with at most one entry per
/// host identity. All lookups return owned copies, so callers iterate a
/// snapshot that concurrent writers cannot disturb.
#[derive(Debug, Default)]
pub struct HostRegistry {
    rooms: RwLock<BTreeMap<RoomId, Vec<Host>>>,
}

impl HostRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<RoomId, Vec<Host>>> {
        self.rooms.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<RoomId, Vec<Host>>> {
        self.rooms.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a host to the room it names
    ///
    /// Returns false if the same host is already listed in that room.
    pub fn insert(&self, host: Host) -> bool {
        let mut rooms = self.write();
        let hosts = rooms.entry(host.room()).or_default();

        if hosts.contains(&host) {
            return false;
        }

        info!("Host {} added", host);
        hosts.push(host);
        true
    }

    /// Removes a host from the room it names
    ///
    /// Returns true if the host was found and removed. Rooms left empty are
    /// dropped from the index.
    pub fn remove(&self, host: &Host) -> bool {
        let mut rooms = self.write();
        let Some(hosts) = rooms.get_mut(&host.room()) else {
            return false;
        };

        let before = hosts.len();
        hosts.retain(|h| h != host);
        let removed = hosts.len() < before;

        if hosts.is_empty() {
            rooms.remove(&host.room());
        }
        if removed {
            info!("Host {} removed", host);
        }
        removed
    }

    /// Moves a host into its (new) room, dropping any entry it had elsewhere
    ///
    /// Returns the rooms the host was listed in before the move.
    pub fn relocate(&self, host: Host) -> Vec<RoomId> {
        let mut rooms = self.write();

        let mut previous = Vec::new();
        for (room, hosts) in rooms.iter_mut() {
            let before = hosts.len();
            hosts.retain(|h| h != &host);
            if hosts.len() < before {
                previous.push(*room);
            }
        }
        rooms.retain(|_, hosts| !hosts.is_empty());

        debug!("Host {} relocated from {:?}", host, previous);
        rooms.entry(host.room()).or_default().push(host);
        previous
    }

    /// Removes every host of a room, returning them
    pub fn remove_room(&self, room: RoomId) -> Vec<Host> {
        let removed = self.write().remove(&room).unwrap_or_default();
        if !removed.is_empty() {
            info!("Removed {} hosts from room {}", removed.len(), room);
        }
        removed
    }

    /// Snapshot of the hosts in a room, in insertion order
    pub fn search(&self, room: RoomId) -> Vec<Host> {
        self.read().get(&room).cloned().unwrap_or_default()
    }

    /// Finds a host by identity in any room
    pub fn find(&self, ip: IpAddr, port: u32) -> Option<Host> {
        self.read()
            .values()
            .flatten()
            .find(|h| h.ip() == ip && h.port() == port)
            .cloned()
    }

    pub fn contains_room(&self, room: RoomId) -> bool {
        self.read().get(&room).is_some_and(|hosts| !hosts.is_empty())
    }

    /// Lazily yields every populated room, sweeping the full room domain
    ///
    /// Each call starts a fresh sweep from -128 up to the reserved value 127.
    pub fn all_rooms(&self) -> impl Iterator<Item = RoomId> + '_ {
        RoomId::all().filter(move |room| self.contains_room(*room))
    }

    /// Snapshot of every known host, grouped by room in ascending room order
    pub fn all_hosts(&self) -> Vec<Host> {
        self.read().values().flatten().cloned().collect()
    }

    /// Inserts many hosts at once, returning how many were new
    pub fn seed(&self, hosts: impl IntoIterator<Item = Host>) -> usize {
        hosts.into_iter().filter(|h| self.insert(h.clone())).count()
    }

    /// Total number of hosts across all rooms
    pub fn len(&self) -> usize {
        self.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
