//! Wire protocol shared by every peer: rooms, frames, fragmentation and
//! port encoding.

pub mod frame;
pub mod reassembly;
pub mod room;

pub use frame::{
    check_message_len, fragment, ControlKind, DecodeError, Frame, FragmentError, HEADER_LEN,
    MAX_DATAGRAM_LEN, MAX_MESSAGE_LEN,
};
pub use reassembly::Reassembler;
pub use room::RoomId;

/// Maximum payload carried by one frame (in bytes)
pub const BUFF_SIZE: usize = 2048;

/// Transmissions per frame before a delivery is given up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Converts a port number into 4 bytes, most significant byte first
pub fn port_to_bytes(port: u32) -> [u8; 4] {
    port.to_be_bytes()
}

/// Reads a port number stored most significant byte first
///
/// Returns `None` unless `bytes` holds exactly 4 bytes.
pub fn bytes_to_port(bytes: &[u8]) -> Option<u32> {
    let array: [u8; 4] = bytes.try_into().ok()?;
    Some(u32::from_be_bytes(array))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_to_bytes_is_big_endian() {
        assert_eq!(port_to_bytes(0x0102_0304), [1, 2, 3, 4]);
        assert_eq!(port_to_bytes(8080), [0, 0, 0x1F, 0x90]);
        assert_eq!(port_to_bytes(0), [0, 0, 0, 0]);
        assert_eq!(port_to_bytes(u32::MAX), [0xFF; 4]);
    }

    #[test]
    fn test_port_symmetry() {
        let samples = [
            0u32,
            1,
            255,
            256,
            8080,
            65535,
            65536,
            0x7FFF_FFFF,
            0x8000_0000,
            0xDEAD_BEEF,
            u32::MAX,
        ];

        for port in samples {
            assert_eq!(bytes_to_port(&port_to_bytes(port)), Some(port));
        }

        for port in (0..=u32::MAX).step_by(65_521) {
            assert_eq!(bytes_to_port(&port_to_bytes(port)), Some(port));
        }
    }

    #[test]
    fn test_bytes_to_port_wrong_length() {
        assert_eq!(bytes_to_port(&[]), None);
        assert_eq!(bytes_to_port(&[1]), None);
        assert_eq!(bytes_to_port(&[1, 2, 3]), None);
        assert_eq!(bytes_to_port(&[1, 2, 3, 4, 5]), None);
        assert_eq!(bytes_to_port(&[0u8; 16]), None);
    }

    #[test]
    fn test_max_datagram_fits_header_and_payload() {
        assert_eq!(MAX_DATAGRAM_LEN, HEADER_LEN + BUFF_SIZE);
        assert_eq!(DEFAULT_MAX_ATTEMPTS, 4);
    }
}
