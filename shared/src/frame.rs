//! Frame header layout, encoding and fragmentation

use crate::room::RoomId;
use crate::{bytes_to_port, port_to_bytes, BUFF_SIZE};
use thiserror::Error;

/// Size of the fixed frame header in bytes
pub const HEADER_LEN: usize = 14;

/// Largest datagram a peer will ever put on the wire
pub const MAX_DATAGRAM_LEN: usize = HEADER_LEN + BUFF_SIZE;

/// Largest message that still fits in `u16::MAX` fragments
pub const MAX_MESSAGE_LEN: usize = BUFF_SIZE * u16::MAX as usize;

/// Purpose of a datagram
///
/// Kept closed: every `match` on it is exhaustive, so adding a kind forces
/// each dispatcher to decide what to do with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// Carries (a fragment of) a chat message
    Plain,
    /// Acknowledges receipt of a previous frame
    Ack,
    /// Asks the receiver to move the sender into a room
    ChangeRoomRequest,
}

impl ControlKind {
    pub fn tag(self) -> u8 {
        match self {
            ControlKind::Plain => 0,
            ControlKind::Ack => 1,
            ControlKind::ChangeRoomRequest => 2,
        }
    }
}

impl TryFrom<u8> for ControlKind {
    type Error = DecodeError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(ControlKind::Plain),
            1 => Ok(ControlKind::Ack),
            2 => Ok(ControlKind::ChangeRoomRequest),
            other => Err(DecodeError::UnknownKind(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("datagram of {0} bytes is shorter than the {} byte header", HEADER_LEN)]
    TooShort(usize),
    #[error("unknown control kind tag: 0x{0:02x}")]
    UnknownKind(u8),
    #[error("payload length {0} exceeds maximum {}", BUFF_SIZE)]
    PayloadTooLarge(usize),
    #[error("fragment count must be at least one")]
    NoFragments,
    #[error("fragment index {index} out of range for {count} fragments")]
    FragmentOutOfRange { index: u16, count: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FragmentError {
    #[error("message of {0} bytes needs more than {} fragments", u16::MAX)]
    MessageTooLarge(usize),
}

/// One transmittable unit: header plus a payload fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: ControlKind,
    pub room: RoomId,
    /// Listening port of the peer that built the frame
    pub source_port: u32,
    pub message_id: u32,
    pub fragment_index: u16,
    pub fragment_count: u16,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Builds the acknowledgment for `frame`, echoing its routing fields
    pub fn ack_for(frame: &Frame, source_port: u32) -> Self {
        Frame {
            kind: ControlKind::Ack,
            room: frame.room,
            source_port,
            message_id: frame.message_id,
            fragment_index: frame.fragment_index,
            fragment_count: 1,
            payload: Vec::new(),
        }
    }

    /// Builds a request asking the receiver to place the sender into `room`
    pub fn room_request(room: RoomId, source_port: u32, message_id: u32) -> Self {
        Frame {
            kind: ControlKind::ChangeRoomRequest,
            room,
            source_port,
            message_id,
            fragment_index: 0,
            fragment_count: 1,
            payload: Vec::new(),
        }
    }

    pub fn is_last_fragment(&self) -> bool {
        self.fragment_index + 1 == self.fragment_count
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(HEADER_LEN + self.payload.len());
        data.push(self.kind.tag());
        data.push(self.room.value() as u8);
        data.extend_from_slice(&port_to_bytes(self.source_port));
        data.extend_from_slice(&self.message_id.to_be_bytes());
        data.extend_from_slice(&self.fragment_index.to_be_bytes());
        data.extend_from_slice(&self.fragment_count.to_be_bytes());
        data.extend_from_slice(&self.payload);
        data
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < HEADER_LEN {
            return Err(DecodeError::TooShort(data.len()));
        }
        let (header, payload) = data.split_at(HEADER_LEN);

        if payload.len() > BUFF_SIZE {
            return Err(DecodeError::PayloadTooLarge(payload.len()));
        }

        let kind = ControlKind::try_from(header[0])?;
        let room = RoomId::new(header[1] as i8);
        let source_port = bytes_to_port(&header[2..6]).ok_or(DecodeError::TooShort(data.len()))?;
        let message_id = u32::from_be_bytes([header[6], header[7], header[8], header[9]]);
        let fragment_index = u16::from_be_bytes([header[10], header[11]]);
        let fragment_count = u16::from_be_bytes([header[12], header[13]]);

        if fragment_count == 0 {
            return Err(DecodeError::NoFragments);
        }
        if fragment_index >= fragment_count {
            return Err(DecodeError::FragmentOutOfRange {
                index: fragment_index,
                count: fragment_count,
            });
        }

        Ok(Frame {
            kind,
            room,
            source_port,
            message_id,
            fragment_index,
            fragment_count,
            payload: payload.to_vec(),
        })
    }
}

/// Fails if a message of `len` bytes cannot be fragmented
pub fn check_message_len(len: usize) -> Result<(), FragmentError> {
    if len > MAX_MESSAGE_LEN {
        return Err(FragmentError::MessageTooLarge(len));
    }
    Ok(())
}

/// Splits `payload` into contiguous `PLAIN` frames of at most `BUFF_SIZE` bytes
///
/// An empty payload still produces one (empty) frame so that empty messages
/// are delivered like any other.
pub fn fragment(
    room: RoomId,
    payload: &[u8],
    source_port: u32,
    message_id: u32,
) -> Result<Vec<Frame>, FragmentError> {
    if payload.is_empty() {
        return Ok(vec![Frame {
            kind: ControlKind::Plain,
            room,
            source_port,
            message_id,
            fragment_index: 0,
            fragment_count: 1,
            payload: Vec::new(),
        }]);
    }

    check_message_len(payload.len())?;
    // bounded by MAX_MESSAGE_LEN
    let fragment_count = payload.len().div_ceil(BUFF_SIZE) as u16;

    Ok(payload
        .chunks(BUFF_SIZE)
        .enumerate()
        .map(|(index, chunk)| Frame {
            kind: ControlKind::Plain,
            room,
            source_port,
            message_id,
            // index < fragment_count, which fits in u16
            fragment_index: index as u16,
            fragment_count,
            payload: chunk.to_vec(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(payload: &[u8]) -> Frame {
        Frame {
            kind: ControlKind::Plain,
            room: RoomId::new(5),
            source_port: 4000,
            message_id: 7,
            fragment_index: 0,
            fragment_count: 1,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn test_control_kind_tags() {
        for kind in [
            ControlKind::Plain,
            ControlKind::Ack,
            ControlKind::ChangeRoomRequest,
        ] {
            assert_eq!(ControlKind::try_from(kind.tag()), Ok(kind));
        }
        assert_eq!(ControlKind::try_from(9), Err(DecodeError::UnknownKind(9)));
    }

    #[test]
    fn test_header_layout() {
        let frame = Frame {
            kind: ControlKind::Ack,
            room: RoomId::new(-2),
            source_port: 0x0102_0304,
            message_id: 0xAABB_CCDD,
            fragment_index: 1,
            fragment_count: 3,
            payload: b"xy".to_vec(),
        };

        let data = frame.encode();
        assert_eq!(data.len(), HEADER_LEN + 2);
        assert_eq!(data[0], 1);
        assert_eq!(data[1], 0xFE);
        assert_eq!(&data[2..6], &[1, 2, 3, 4]);
        assert_eq!(&data[6..10], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(&data[10..12], &[0, 1]);
        assert_eq!(&data[12..14], &[0, 3]);
        assert_eq!(&data[14..], b"xy");
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let frames = vec![
            plain(b"hello"),
            plain(b""),
            plain(&[0u8; BUFF_SIZE]),
            Frame::ack_for(&plain(b"hello"), 9000),
            Frame::room_request(RoomId::RESERVED, u32::MAX, 0),
        ];

        for frame in frames {
            let decoded = Frame::decode(&frame.encode()).unwrap();
            assert_eq!(decoded, frame);
        }
    }

    #[test]
    fn test_decode_rejects_short_datagram() {
        let data = plain(b"").encode();
        assert_eq!(
            Frame::decode(&data[..HEADER_LEN - 1]),
            Err(DecodeError::TooShort(HEADER_LEN - 1))
        );
        assert_eq!(Frame::decode(&[]), Err(DecodeError::TooShort(0)));
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        let mut data = plain(b"abc").encode();
        data[0] = 0x7F;
        assert_eq!(Frame::decode(&data), Err(DecodeError::UnknownKind(0x7F)));
    }

    #[test]
    fn test_decode_rejects_oversized_payload() {
        let mut data = plain(b"").encode();
        data.extend(std::iter::repeat(0u8).take(BUFF_SIZE + 1));
        assert_eq!(
            Frame::decode(&data),
            Err(DecodeError::PayloadTooLarge(BUFF_SIZE + 1))
        );
    }

    #[test]
    fn test_decode_rejects_bad_fragment_fields() {
        let mut frame = plain(b"abc");
        frame.fragment_count = 0;
        assert_eq!(Frame::decode(&frame.encode()), Err(DecodeError::NoFragments));

        frame.fragment_count = 2;
        frame.fragment_index = 2;
        assert_eq!(
            Frame::decode(&frame.encode()),
            Err(DecodeError::FragmentOutOfRange { index: 2, count: 2 })
        );
    }

    #[test]
    fn test_ack_echoes_routing_fields() {
        let mut original = plain(b"data");
        original.fragment_index = 2;
        original.fragment_count = 4;

        let ack = Frame::ack_for(&original, 1234);
        assert_eq!(ack.kind, ControlKind::Ack);
        assert_eq!(ack.room, original.room);
        assert_eq!(ack.message_id, original.message_id);
        assert_eq!(ack.fragment_index, 2);
        assert_eq!(ack.source_port, 1234);
        assert!(ack.payload.is_empty());
    }

    #[test]
    fn test_fragment_small_message() {
        let frames = fragment(RoomId::new(5), b"hello", 4000, 1).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload, b"hello");
        assert_eq!(frames[0].kind, ControlKind::Plain);
        assert_eq!(frames[0].fragment_count, 1);
        assert!(frames[0].is_last_fragment());
    }

    #[test]
    fn test_fragment_empty_message() {
        let frames = fragment(RoomId::new(0), b"", 4000, 1).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].payload.is_empty());
    }

    #[test]
    fn test_fragment_sizes() {
        for size in [1, BUFF_SIZE - 1, BUFF_SIZE, BUFF_SIZE + 1, 3 * BUFF_SIZE, 10_000] {
            let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let frames = fragment(RoomId::new(1), &payload, 4000, 3).unwrap();

            assert_eq!(frames.len(), size.div_ceil(BUFF_SIZE));
            assert!(frames.iter().all(|f| f.payload.len() <= BUFF_SIZE));
            assert!(frames
                .iter()
                .enumerate()
                .all(|(i, f)| f.fragment_index as usize == i
                    && f.fragment_count as usize == frames.len()));

            let joined: Vec<u8> = frames.iter().flat_map(|f| f.payload.clone()).collect();
            assert_eq!(joined, payload);
        }
    }

    #[test]
    fn test_check_message_len_limit() {
        assert_eq!(check_message_len(0), Ok(()));
        assert_eq!(check_message_len(MAX_MESSAGE_LEN), Ok(()));
        assert_eq!(
            check_message_len(MAX_MESSAGE_LEN + 1),
            Err(FragmentError::MessageTooLarge(MAX_MESSAGE_LEN + 1))
        );
        assert_eq!(MAX_MESSAGE_LEN.div_ceil(BUFF_SIZE), u16::MAX as usize);
    }
}
