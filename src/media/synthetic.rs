//! Synthetic media source
//!
//! Stands in for the capture/encoder façades in the demo binaries and
//! integration tests: emits parameter-set-shaped config blobs, key and
//! delta access units on a fixed cadence, and honors on-demand key-frame
//! requests the way a real encoder façade must.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use crate::media::{MediaEvent, VideoEncoderHandle};
use crate::protocol::Dimension;

/// H.264-flavoured placeholder config (SPS/PPS-shaped bytes)
const VIDEO_CONFIG_BLOB: &[u8] = &[0x67, 0x42, 0x00, 0x1E, 0x68, 0xCE, 0x38, 0x80];

/// AAC-flavoured placeholder init marker
const AUDIO_CONFIG_BLOB: &[u8] = &[0x11, 0x90];

/// Key-frame requests arrive from the transport thread; the source picks
/// them up on its next video tick.
#[derive(Clone)]
pub struct SyntheticEncoderHandle {
    key_requested: Arc<AtomicBool>,
}

impl VideoEncoderHandle for SyntheticEncoderHandle {
    fn request_key_frame(&self) {
        self.key_requested.store(true, Ordering::Release);
    }
}

/// Deterministic test-pattern A/V source
pub struct SyntheticSource {
    dimension: Dimension,
    key_interval: u64,
    video_frame_len: usize,
    audio_frame_len: usize,
    frame_index: u64,
    audio_index: u64,
    config_pending: bool,
    key_requested: Arc<AtomicBool>,
}

impl SyntheticSource {
    pub fn new(dimension: Dimension) -> Self {
        Self {
            dimension,
            key_interval: 60,
            video_frame_len: 768,
            audio_frame_len: 128,
            frame_index: 0,
            audio_index: 0,
            config_pending: true,
            key_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle the transport hands its "client connected" signal to
    pub fn encoder_handle(&self) -> SyntheticEncoderHandle {
        SyntheticEncoderHandle {
            key_requested: self.key_requested.clone(),
        }
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Simulate an orientation/resolution change: the next video tick
    /// re-emits config and a key frame, as a real encoder does after a
    /// dimension change.
    pub fn set_dimension(&mut self, dimension: Dimension) {
        if dimension != self.dimension {
            self.dimension = dimension;
            self.config_pending = true;
            self.key_requested.store(true, Ordering::Release);
        }
    }

    /// Produce the events for one video frame interval: config first when
    /// it is new or refreshed, then exactly one access unit.
    pub fn next_video(&mut self) -> Vec<MediaEvent> {
        let mut events = Vec::with_capacity(2);
        if self.config_pending {
            events.push(MediaEvent::VideoConfig(Bytes::from_static(VIDEO_CONFIG_BLOB)));
            events.push(MediaEvent::AudioConfig(Bytes::from_static(AUDIO_CONFIG_BLOB)));
            events.push(MediaEvent::Dimension(self.dimension));
            self.config_pending = false;
        }

        let on_interval = self.frame_index % self.key_interval == 0;
        let requested = self.key_requested.swap(false, Ordering::AcqRel);
        let key = on_interval || requested;
        events.push(MediaEvent::Video {
            payload: self.access_unit(key),
            key,
        });
        self.frame_index += 1;
        events
    }

    /// Produce one audio frame
    pub fn next_audio(&mut self) -> MediaEvent {
        let mut buf = BytesMut::with_capacity(self.audio_frame_len);
        buf.put_u8(0xAF);
        buf.put_u64(self.audio_index);
        buf.resize(self.audio_frame_len, 0x22);
        self.audio_index += 1;
        MediaEvent::Audio(buf.freeze())
    }

    fn access_unit(&self, key: bool) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.video_frame_len);
        // NAL-ish marker byte: IDR-shaped for keys, non-IDR otherwise.
        buf.put_u8(if key { 0x65 } else { 0x41 });
        buf.put_u64(self.frame_index);
        buf.put_u32(self.dimension.width);
        buf.put_u32(self.dimension.height);
        buf.resize(self.video_frame_len, 0x5A);
        buf.freeze()
    }
}
