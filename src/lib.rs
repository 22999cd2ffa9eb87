//! # Screen Reflect
//!
//! Low-latency screen mirroring over LAN: one host captures and encodes
//! H.264 video and AAC audio, the other decodes and renders, connected by
//! a single framed TCP stream with zero-configuration discovery.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────── PRODUCER ───────────────────────────┐
//! │  ┌─────────┐  ┌───────────────┐  ┌───────────────┐              │
//! │  │ Capture │─▶│ Video Encoder │─▶│               │              │
//! │  │ façade  │  │    façade     │  │    Packet     │  ┌─────────┐ │
//! │  └─────────┘  └───────────────┘  │  Multiplexer  │─▶│Transport│ │
//! │  ┌─────────┐  ┌───────────────┐  │  (caches +    │  │ Server  │ │
//! │  │Playback │─▶│ Audio Encoder │─▶│   bounded     │  └────┬────┘ │
//! │  │ capture │  │    façade     │  │   queues)     │       │      │
//! │  └─────────┘  └───────────────┘  └───────────────┘       │      │
//! └──────────────────────────────────────────────────────────┼──────┘
//!                                 framed packets over one TCP │
//! ┌──────────────────────────── CONSUMER ────────────────────▼──────┐
//! │  ┌───────────┐  ┌──────────────┐  ┌───────────────┐  ┌────────┐ │
//! │  │ Transport │─▶│    Stream    │─▶│ Video/Audio   │─▶│ Render │ │
//! │  │  Client   │  │    Parser    │  │ decoder       │  │ façade │ │
//! │  └───────────┘  └──────────────┘  │ façades       │  └────────┘ │
//! │                        │          └───────────────┘             │
//! │                        └─▶ dimension / state observers          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The crate owns the framed multiplex protocol, the producer-side session
//! caches and drop policies, the transport state machines on both ends,
//! and the consumer-side stream parser. Capture sources, codec engines,
//! rendering surfaces and mDNS backends stay behind the traits in
//! [`media`] and [`discovery`].

pub mod config;
pub mod discovery;
pub mod error;
pub mod media;
pub mod mux;
pub mod observer;
pub mod pipeline;
pub mod protocol;
pub mod transport;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default TCP port for the mirror stream
    pub const DEFAULT_TCP_PORT: u16 = 7432;

    /// Default maximum accepted payload length (10 MiB)
    pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 10 * 1024 * 1024;

    /// Hard lower bound for the configurable payload limit (1 MiB)
    pub const MIN_MAX_PAYLOAD_LEN: usize = 1024 * 1024;

    /// Hard upper bound for the configurable payload limit (16 MiB)
    pub const MAX_MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

    /// Video queue capacity in frames (one second at 60 fps)
    pub const VIDEO_QUEUE_CAPACITY: usize = 60;

    /// Audio queue capacity in frames
    pub const AUDIO_QUEUE_CAPACITY: usize = 256;

    /// Frames taken from each live queue per drain tick
    pub const DRAIN_INTERLEAVE_BATCH: usize = 2;

    /// Writer park interval between drain ticks in milliseconds
    pub const WRITER_POLL_INTERVAL_MS: u64 = 5;

    /// Accept poll interval while listening, in milliseconds
    pub const ACCEPT_POLL_INTERVAL_MS: u64 = 25;

    /// Socket send buffer sized for a single-frame burst at peak bitrate
    pub const SEND_BUFFER_SIZE: usize = 4 * 1024 * 1024;

    /// TCP keepalive idle time in seconds
    pub const KEEPALIVE_IDLE_SECS: u64 = 5;

    /// TCP keepalive probe interval in seconds
    pub const KEEPALIVE_INTERVAL_SECS: u64 = 2;

    /// TCP keepalive probe count before declaring the peer dead
    pub const KEEPALIVE_RETRIES: u32 = 3;

    /// Window after accept in which a key frame is expected, in milliseconds
    pub const KEY_FRAME_WATCHDOG_MS: u64 = 2000;

    /// Default consumer connect timeout in milliseconds
    pub const CONNECT_TIMEOUT_MS: u64 = 3000;
}
