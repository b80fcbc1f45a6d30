//! Remote participants and local-address detection

use serde::{Deserialize, Serialize};
use shared::RoomId;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use tokio::net::UdpSocket;

/// One remote participant
///
/// Two hosts are the same participant when address and port match; the
/// room is mutable state and takes no part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    ip: IpAddr,
    port: u32,
    room: RoomId,
}

impl Host {
    pub fn new(ip: IpAddr, port: u32, room: RoomId) -> Self {
        Self { ip, port, room }
    }

    pub fn from_socket_addr(addr: SocketAddr, room: RoomId) -> Self {
        Self::new(addr.ip(), addr.port() as u32, room)
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn port(&self) -> u32 {
        self.port
    }

    pub fn room(&self) -> RoomId {
        self.room
    }

    pub fn with_room(&self, room: RoomId) -> Self {
        Self::new(self.ip, self.port, room)
    }

    /// Transport address of the host, `None` if the port exceeds 16 bits
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        let port = u16::try_from(self.port).ok()?;
        Some(SocketAddr::new(self.ip, port))
    }

    /// True if this host is the local peer itself
    pub fn is_local(&self, interfaces: &LocalInterfaces, local_port: u32) -> bool {
        self.port == local_port && interfaces.contains(&self.ip)
    }
}

impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.ip == other.ip && self.port == other.port
    }
}

impl Eq for Host {}

impl Hash for Host {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ip.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(ip) => write!(f, "{}:{} (room {})", ip, self.port, self.room),
            IpAddr::V6(ip) => write!(f, "[{}]:{} (room {})", ip, self.port, self.room),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected <ip>:<port>:<room>, got {0:?}")]
pub struct ParseHostError(String);

/// Parses `ip:port:room`, e.g. `192.168.1.4:5000:3` or `[::1]:5000:-2`
impl FromStr for Host {
    type Err = ParseHostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseHostError(s.to_string());
        let (addr, room) = s.trim().rsplit_once(':').ok_or_else(err)?;
        let addr: SocketAddr = addr.parse().map_err(|_| err())?;
        let room: RoomId = room.parse().map_err(|_| err())?;
        Ok(Host::from_socket_addr(addr, room))
    }
}

/// Addresses under which this machine can be reached
#[derive(Debug, Clone, Default)]
pub struct LocalInterfaces {
    addrs: HashSet<IpAddr>,
}

impl LocalInterfaces {
    pub fn from_addrs(addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            addrs: addrs.into_iter().collect(),
        }
    }

    /// Collects loopback, the bound address and the outbound interface addresses
    ///
    /// Outbound addresses are found by connecting throwaway UDP sockets, which
    /// selects a route without sending anything. Lookups that fail (no route,
    /// no IPv6) are skipped.
    pub async fn discover(bound: SocketAddr) -> Self {
        let mut addrs: HashSet<IpAddr> = [
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(Ipv6Addr::LOCALHOST),
        ]
        .into_iter()
        .collect();

        if !bound.ip().is_unspecified() {
            addrs.insert(bound.ip());
        }

        let routes = [
            ("0.0.0.0:0", "8.8.8.8:80"),
            ("[::]:0", "[2001:4860:4860::8888]:80"),
        ];
        for (local, remote) in routes {
            if let Some(ip) = outbound_ip(local, remote).await {
                addrs.insert(ip);
            }
        }

        Self { addrs }
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.addrs.contains(ip)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IpAddr> {
        self.addrs.iter()
    }
}

async fn outbound_ip(local: &str, remote: &str) -> Option<IpAddr> {
    let socket = UdpSocket::bind(local).await.ok()?;
    socket.connect(remote).await.ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}
