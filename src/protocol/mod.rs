//! Wire protocol: packet taxonomy and framing
//!
//! Every packet on the wire is a 5-byte header (kind + big-endian length)
//! followed by an opaque payload. Packets are atomic: either fully
//! delivered or the session is considered broken.

pub mod framing;
pub mod packet;

pub use framing::{write_packet, FrameHeader, HEADER_LEN};
pub use packet::{Dimension, Packet, PacketKind};
