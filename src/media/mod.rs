//! Media façade contracts
//!
//! Capture sources, codec engines and rendering surfaces live outside the
//! crate; these traits are the seams the core consumes. The encoder never
//! learns about the transport: the "client connected, give me a key
//! frame" signal flows through [`VideoEncoderHandle`], owned by the core.

pub mod synthetic;

pub use synthetic::{SyntheticEncoderHandle, SyntheticSource};

use bytes::Bytes;

use crate::error::MediaError;
use crate::protocol::Dimension;

/// One tagged output from the encoder façades, submitted to the
/// multiplexer
#[derive(Debug, Clone)]
pub enum MediaEvent {
    /// Video codec init bytes became available or changed
    VideoConfig(Bytes),
    /// One encoded video access unit
    Video { payload: Bytes, key: bool },
    /// One encoded audio frame
    Audio(Bytes),
    /// Audio codec init bytes or marker
    AudioConfig(Bytes),
    /// Encoded picture size changed
    Dimension(Dimension),
}

/// Producer-side handle into the video encoder façade
pub trait VideoEncoderHandle: Send + Sync {
    /// Ask the encoder to emit a key frame at the next opportunity, so a
    /// fresh session does not wait out the periodic key-frame interval.
    fn request_key_frame(&self);
}

/// Consumer-side dispatch target for parsed packets
///
/// Dispatch happens synchronously on the transport reader thread;
/// implementations must return quickly and do their own threading if
/// decode work is heavy.
pub trait StreamSink: Send {
    fn on_video_config(&mut self, config: &[u8]);
    fn on_video(&mut self, access_unit: &[u8]);
    fn on_audio_config(&mut self, config: &[u8]);
    fn on_audio(&mut self, frame: &[u8]);
    fn on_dimension(&mut self, dimension: Dimension);

    /// Return every decoder to a known-empty state. Called when a session
    /// starts, before any bytes are read.
    fn reset(&mut self);
}

/// Video decoder façade
pub trait VideoDecoder: Send {
    /// Feed codec init bytes; may be called again mid-session when the
    /// producer refreshes its config.
    fn configure(&mut self, config: &[u8]) -> Result<(), MediaError>;

    /// Decode one access unit. Failing before `configure` is the expected
    /// cache-miss case; the session keeps running.
    fn decode(&mut self, access_unit: &[u8]) -> Result<(), MediaError>;

    fn reset(&mut self);
}

/// Audio decoder façade
pub trait AudioDecoder: Send {
    fn configure(&mut self, config: &[u8]) -> Result<(), MediaError>;
    fn decode(&mut self, frame: &[u8]) -> Result<(), MediaError>;
    fn reset(&mut self);
}

/// Sink that discards everything; useful for tests and soak runs
#[derive(Debug, Default)]
pub struct NullSink;

impl StreamSink for NullSink {
    fn on_video_config(&mut self, _config: &[u8]) {}
    fn on_video(&mut self, _access_unit: &[u8]) {}
    fn on_audio_config(&mut self, _config: &[u8]) {}
    fn on_audio(&mut self, _frame: &[u8]) {}
    fn on_dimension(&mut self, _dimension: Dimension) {}
    fn reset(&mut self) {}
}
