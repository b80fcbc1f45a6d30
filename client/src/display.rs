//! Turns peer events and query results into terminal text

use peer::{Host, PeerEvent};
use shared::RoomId;

pub fn format_event(event: &PeerEvent) -> String {
    match event {
        PeerEvent::Message { from, room, text } => {
            format!("[{}] {}:{} > {}", room, from.ip(), from.port(), text)
        }
        PeerEvent::RoomChangeRequested { from, room } if room.is_reserved() => {
            format!("* {}:{} is looking for a room", from.ip(), from.port())
        }
        PeerEvent::RoomChangeRequested { from, room } => {
            format!("* {}:{} moved to room {}", from.ip(), from.port(), room)
        }
        PeerEvent::DeliveryFailed { to, room } => {
            format!("! message to {}:{} in room {} was not delivered", to.ip(), to.port(), room)
        }
    }
}

pub fn format_hosts(room: RoomId, hosts: &[Host]) -> String {
    if hosts.is_empty() {
        return format!("Nobody else in room {}", room);
    }
    let mut out = format!("{} host(s) in room {}:", hosts.len(), room);
    for host in hosts {
        out.push_str(&format!("\n  {}", host));
    }
    out
}

pub fn format_rooms(rooms: impl IntoIterator<Item = RoomId>) -> String {
    let rooms: Vec<String> = rooms.into_iter().map(|r| r.to_string()).collect();
    if rooms.is_empty() {
        "No populated rooms".to_string()
    } else {
        format!("Populated rooms: {}", rooms.join(", "))
    }
}
