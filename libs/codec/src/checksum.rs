//! CRC32 frame checksums
//!
//! The checksum covers every byte of the frame before the 4-byte trailer
//! and is stored little-endian.

use bytes::{BufMut, BytesMut};

pub const CHECKSUM_LEN: usize = 4;

pub fn calculate_crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Append the checksum of `frame` to it
pub fn append_checksum(frame: &mut BytesMut) {
    let checksum = calculate_crc32(frame);
    frame.put_u32_le(checksum);
}

/// Split a frame into (body, stored checksum, calculated checksum)
pub fn split_checksum(frame: &[u8]) -> Option<(&[u8], u32, u32)> {
    if frame.len() < CHECKSUM_LEN {
        return None;
    }
    let (body, trailer) = frame.split_at(frame.len() - CHECKSUM_LEN);
    let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    Some((body, stored, calculate_crc32(body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_then_verify() {
        let mut frame = BytesMut::from(&[0x01u8, 0x02, 0x03, 0x04][..]);
        append_checksum(&mut frame);
        assert_eq!(frame.len(), 8);

        let (body, stored, calculated) = split_checksum(&frame).unwrap();
        assert_eq!(body, &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(stored, calculated);

        // corrupt the body
        frame[0] = 0xFF;
        let (_, stored, calculated) = split_checksum(&frame).unwrap();
        assert_ne!(stored, calculated);
    }

    #[test]
    fn test_short_frame() {
        assert!(split_checksum(&[0x01, 0x02]).is_none());
    }
}
