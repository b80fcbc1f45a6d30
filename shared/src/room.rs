//! Room ("data flow") identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Single-byte identifier of a conversation channel
///
/// The full signed byte range is valid. `RoomId::RESERVED` (127) means
/// "indifferent to room" and only appears in room-change requests, never as
/// the room a host actually sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub i8);

impl RoomId {
    pub const RESERVED: RoomId = RoomId(i8::MAX);
    pub const MIN: RoomId = RoomId(i8::MIN);

    pub fn new(id: i8) -> Self {
        RoomId(id)
    }

    pub fn value(self) -> i8 {
        self.0
    }

    pub fn is_reserved(self) -> bool {
        self == Self::RESERVED
    }

    /// Iterates every room identifier from -128 up to and including 127
    ///
    /// Each value is yielded exactly once. The iterator stops after the
    /// reserved value instead of wrapping back around to -128.
    pub fn all() -> AllRooms {
        AllRooms {
            next: Some(Self::MIN),
        }
    }
}

impl From<i8> for RoomId {
    fn from(id: i8) -> Self {
        RoomId(id)
    }
}

impl From<RoomId> for i8 {
    fn from(room: RoomId) -> Self {
        room.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoomId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i8>().map(RoomId)
    }
}

/// Restartable sweep over the whole room domain, see [`RoomId::all`]
#[derive(Debug, Clone)]
pub struct AllRooms {
    next: Option<RoomId>,
}

impl Iterator for AllRooms {
    type Item = RoomId;

    fn next(&mut self) -> Option<RoomId> {
        let current = self.next?;
        // checked_add yields None at 127, which ends the sweep
        self.next = current.0.checked_add(1).map(RoomId);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.next {
            Some(room) => (i8::MAX as i16 - room.0 as i16 + 1) as usize,
            None => 0,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for AllRooms {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_reserved_room() {
        assert_eq!(RoomId::RESERVED.value(), 127);
        assert!(RoomId::RESERVED.is_reserved());
        assert!(!RoomId::new(5).is_reserved());
        assert!(!RoomId::new(-128).is_reserved());
    }

    #[test]
    fn test_all_rooms_visits_each_value_once() {
        let rooms: Vec<RoomId> = RoomId::all().collect();
        assert_eq!(rooms.len(), 256);

        let unique: HashSet<RoomId> = rooms.iter().copied().collect();
        assert_eq!(unique.len(), 256);

        assert_eq!(rooms.first(), Some(&RoomId::MIN));
        assert_eq!(rooms.last(), Some(&RoomId::RESERVED));
        assert_eq!(rooms[rooms.len() - 2], RoomId::new(126));
    }

    #[test]
    fn test_all_rooms_is_ordered_and_restartable() {
        let first: Vec<i8> = RoomId::all().map(RoomId::value).collect();
        let second: Vec<i8> = RoomId::all().map(RoomId::value).collect();
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_all_rooms_size_hint() {
        let mut rooms = RoomId::all();
        assert_eq!(rooms.len(), 256);
        rooms.next();
        assert_eq!(rooms.len(), 255);
        let rest: Vec<_> = rooms.by_ref().collect();
        assert_eq!(rest.len(), 255);
        assert_eq!(rooms.len(), 0);
        assert_eq!(rooms.next(), None);
    }

    #[test]
    fn test_room_parsing() {
        assert_eq!("5".parse::<RoomId>().unwrap(), RoomId::new(5));
        assert_eq!(" -12 ".parse::<RoomId>().unwrap(), RoomId::new(-12));
        assert_eq!("127".parse::<RoomId>().unwrap(), RoomId::RESERVED);
        assert!("128".parse::<RoomId>().is_err());
        assert!("lobby".parse::<RoomId>().is_err());
    }

    #[test]
    fn test_room_display() {
        assert_eq!(RoomId::new(-3).to_string(), "-3");
        assert_eq!(RoomId::RESERVED.to_string(), "127");
    }
}
