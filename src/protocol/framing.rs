//! Framing: 1-byte kind + 4-byte big-endian length + payload
//!
//! `length` counts payload bytes only. The accepted maximum is
//! configurable within [1 MiB, 16 MiB]; a longer frame is fatal to the
//! session on the consumer.

use std::io::Write;

use crate::constants::{MAX_MAX_PAYLOAD_LEN, MIN_MAX_PAYLOAD_LEN};
use crate::error::ProtocolError;
use crate::protocol::packet::Packet;

/// Wire header size: kind byte plus length word
pub const HEADER_LEN: usize = 5;

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw kind byte; may be a reserved value the reader must skip
    pub kind: u8,
    /// Payload length in bytes
    pub len: u32,
}

impl FrameHeader {
    /// Parse the fixed-size header
    pub fn parse(buf: &[u8; HEADER_LEN]) -> Self {
        Self {
            kind: buf[0],
            len: u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]),
        }
    }

    /// Reject payload lengths above the session maximum
    pub fn validate(&self, max_payload_len: usize) -> Result<(), ProtocolError> {
        if self.len as usize > max_payload_len {
            return Err(ProtocolError::PayloadTooLarge {
                len: self.len as usize,
                max: max_payload_len,
            });
        }
        Ok(())
    }
}

/// Clamp a configured payload limit into the protocol's allowed range
pub fn clamp_max_payload_len(requested: usize) -> usize {
    requested.clamp(MIN_MAX_PAYLOAD_LEN, MAX_MAX_PAYLOAD_LEN)
}

/// Write one framed packet to a sink. Header and payload are two writes
/// into the caller's buffered writer; the caller flushes per drain batch.
pub fn write_packet<W: Write>(writer: &mut W, packet: &Packet) -> std::io::Result<()> {
    let mut header = [0u8; HEADER_LEN];
    header[0] = packet.kind.as_wire();
    header[1..5].copy_from_slice(&(packet.len() as u32).to_be_bytes());
    writer.write_all(&header)?;
    writer.write_all(&packet.payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::{Dimension, PacketKind};
    use bytes::Bytes;

    #[test]
    fn test_write_header_layout() {
        let packet = Packet::video(Bytes::from_static(&[0xAA, 0xBB, 0xCC]));
        let mut frame = Vec::new();
        write_packet(&mut frame, &packet).unwrap();
        assert_eq!(frame, vec![0x01, 0x00, 0x00, 0x00, 0x03, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_write_dimension_frame() {
        let packet = Packet::dimension(Dimension::new(1920, 1080));
        let mut frame = Vec::new();
        write_packet(&mut frame, &packet).unwrap();
        assert_eq!(frame[..HEADER_LEN], [0x04, 0x00, 0x00, 0x00, 0x08]);
        assert_eq!(frame[HEADER_LEN..], [0x00, 0x00, 0x07, 0x80, 0x00, 0x00, 0x04, 0x38]);
    }

    #[test]
    fn test_header_parse() {
        let header = FrameHeader::parse(&[0x04, 0x00, 0x00, 0x00, 0x08]);
        assert_eq!(header.kind, PacketKind::Dimension.as_wire());
        assert_eq!(header.len, 8);
    }

    #[test]
    fn test_header_parse_reserved_kind() {
        let header = FrameHeader::parse(&[0xEE, 0x00, 0x00, 0x00, 0x04]);
        assert_eq!(header.kind, 0xEE);
        assert_eq!(header.len, 4);
    }

    #[test]
    fn test_length_validation() {
        let max = 10 * 1024 * 1024;
        let ok = FrameHeader { kind: 0x01, len: max as u32 };
        assert!(ok.validate(max).is_ok());

        let too_big = FrameHeader { kind: 0x01, len: max as u32 + 1 };
        assert!(matches!(
            too_big.validate(max),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_clamp_max_payload() {
        assert_eq!(clamp_max_payload_len(0), MIN_MAX_PAYLOAD_LEN);
        assert_eq!(clamp_max_payload_len(usize::MAX), MAX_MAX_PAYLOAD_LEN);
        let ten_mib = 10 * 1024 * 1024;
        assert_eq!(clamp_max_payload_len(ten_mib), ten_mib);
    }

    #[test]
    fn test_back_to_back_frames() {
        let a = Packet::video_config(Bytes::from_static(&[0x67, 0x42, 0x00, 0x1E]));
        let b = Packet::audio_config(Bytes::from_static(&[0x11, 0x90]));
        let mut buf = Vec::new();
        write_packet(&mut buf, &a).unwrap();
        write_packet(&mut buf, &b).unwrap();

        let first = FrameHeader::parse(&buf[..HEADER_LEN].try_into().unwrap());
        assert_eq!(first.kind, 0x00);
        assert_eq!(first.len, 4);
        let second_start = HEADER_LEN + first.len as usize;
        let second =
            FrameHeader::parse(&buf[second_start..second_start + HEADER_LEN].try_into().unwrap());
        assert_eq!(second.kind, 0x03);
        assert_eq!(second.len, 2);
    }
}
