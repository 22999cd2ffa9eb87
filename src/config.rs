//! Runtime configuration
//!
//! Defaults come from [`crate::constants`]; applications override the few
//! knobs they care about and pass the sections to the components that
//! consume them.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::protocol::framing::clamp_max_payload_len;

/// Shared socket/network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Producer listening port; 0 binds an ephemeral port
    pub port: u16,
    /// Socket send buffer on the producer, sized for one frame burst
    pub send_buffer_size: usize,
    /// Consumer connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_TCP_PORT,
            send_buffer_size: SEND_BUFFER_SIZE,
            connect_timeout_ms: CONNECT_TIMEOUT_MS,
        }
    }
}

/// Producer-side tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    pub video_queue_capacity: usize,
    pub audio_queue_capacity: usize,
    /// Frames taken from each live queue per drain tick (clamped to 1-5)
    pub interleave_batch: usize,
    /// Writer park interval between drain ticks, in milliseconds
    pub writer_poll_interval_ms: u64,
    /// Diagnostic window for the post-accept key frame, in milliseconds
    pub key_frame_watchdog_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            video_queue_capacity: VIDEO_QUEUE_CAPACITY,
            audio_queue_capacity: AUDIO_QUEUE_CAPACITY,
            interleave_batch: DRAIN_INTERLEAVE_BATCH,
            writer_poll_interval_ms: WRITER_POLL_INTERVAL_MS,
            key_frame_watchdog_ms: KEY_FRAME_WATCHDOG_MS,
        }
    }
}

/// Consumer-side tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Maximum accepted payload length; clamped into [1 MiB, 16 MiB]
    pub max_payload_len: usize,
}

impl ConsumerConfig {
    /// Payload limit with the protocol bounds applied
    pub fn effective_max_payload_len(&self) -> usize {
        clamp_max_payload_len(self.max_payload_len)
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub producer: ProducerConfig,
    pub consumer: ConsumerConfig,
}
