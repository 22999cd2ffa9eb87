//! Packet taxonomy
//!
//! The closed set of packet kinds carried on the wire, plus the typed
//! Dimension payload. Kind values 0x05-0xFF are reserved; consumers skip
//! them without ending the session.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Wire packet kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    /// Opaque video codec init bytes (e.g. parameter sets)
    VideoConfig = 0x00,
    /// One video access unit
    Video = 0x01,
    /// One audio frame, self-delimited at the codec layer
    Audio = 0x02,
    /// Opaque audio codec init bytes or marker
    AudioConfig = 0x03,
    /// Exactly 8 bytes: width then height, u32 big-endian each
    Dimension = 0x04,
}

impl PacketKind {
    /// Map a wire byte to a known kind. Unknown values return `None` and
    /// must be consumed-and-ignored by the reader.
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(PacketKind::VideoConfig),
            0x01 => Some(PacketKind::Video),
            0x02 => Some(PacketKind::Audio),
            0x03 => Some(PacketKind::AudioConfig),
            0x04 => Some(PacketKind::Dimension),
            _ => None,
        }
    }

    /// Wire byte for this kind
    pub fn as_wire(self) -> u8 {
        self as u8
    }
}

/// One wire packet: a kind plus an opaque payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(kind: PacketKind, payload: Bytes) -> Self {
        Self { kind, payload }
    }

    pub fn video_config(payload: Bytes) -> Self {
        Self::new(PacketKind::VideoConfig, payload)
    }

    pub fn video(payload: Bytes) -> Self {
        Self::new(PacketKind::Video, payload)
    }

    pub fn audio(payload: Bytes) -> Self {
        Self::new(PacketKind::Audio, payload)
    }

    pub fn audio_config(payload: Bytes) -> Self {
        Self::new(PacketKind::AudioConfig, payload)
    }

    pub fn dimension(dim: Dimension) -> Self {
        Self::new(PacketKind::Dimension, dim.encode())
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Encoded frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

impl Dimension {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Encode as the 8-byte wire payload: width then height, big-endian
    pub fn encode(self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u32(self.width);
        buf.put_u32(self.height);
        buf.freeze()
    }

    /// Decode from a wire payload. Any length other than 8 is an
    /// impossible kind/length combination and fatal to the session.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() != 8 {
            return Err(ProtocolError::BadDimensionLength(payload.len()));
        }
        let width = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let height = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
        Ok(Self { width, height })
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
