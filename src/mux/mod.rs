//! Packet multiplexer (producer side)
//!
//! Accepts encoder outputs tagged by kind, updates the session caches,
//! enforces the backpressure policy and presents a single ordered drain
//! to the transport writer. `submit` never blocks and never touches I/O;
//! the writer parks on a wakeup channel between drain ticks.

pub mod cache;
pub mod queue;

pub use cache::{CacheSnapshot, SessionCache};
pub use queue::{AudioQueue, QueueStats, VideoFrame, VideoQueue};

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::constants::{AUDIO_QUEUE_CAPACITY, DRAIN_INTERLEAVE_BATCH, VIDEO_QUEUE_CAPACITY};
use crate::media::MediaEvent;
use crate::protocol::{Dimension, Packet};

/// Multiplexer counters snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct MuxStats {
    pub video: QueueStats,
    pub audio: QueueStats,
    pub key_frames_drained: u64,
    pub session_resets: u64,
}

/// Producer-side packet multiplexer
pub struct Multiplexer {
    cache: SessionCache,
    video: VideoQueue,
    audio: AudioQueue,
    interleave_batch: usize,
    wakeup_tx: Sender<()>,
    wakeup_rx: Receiver<()>,
    key_frames_drained: AtomicU64,
    session_resets: AtomicU64,
}

impl Multiplexer {
    /// Multiplexer with the default queue capacities
    pub fn new() -> Self {
        Self::with_capacities(
            VIDEO_QUEUE_CAPACITY,
            AUDIO_QUEUE_CAPACITY,
            DRAIN_INTERLEAVE_BATCH,
        )
    }

    pub fn with_capacities(
        video_capacity: usize,
        audio_capacity: usize,
        interleave_batch: usize,
    ) -> Self {
        let (wakeup_tx, wakeup_rx) = bounded(1);
        Self {
            cache: SessionCache::new(),
            video: VideoQueue::new(video_capacity),
            audio: AudioQueue::new(audio_capacity),
            interleave_batch: interleave_batch.clamp(1, 5),
            wakeup_tx,
            wakeup_rx,
            key_frames_drained: AtomicU64::new(0),
            session_resets: AtomicU64::new(0),
        }
    }

    /// Accept one encoder output. Completes in O(1) without waiting on
    /// I/O; overflow is handled by the queue drop policies.
    pub fn submit(&self, event: MediaEvent) {
        match event {
            MediaEvent::VideoConfig(blob) => self.cache.set_video_config(blob),
            MediaEvent::Video { payload, key } => {
                if key {
                    self.cache.set_key_frame(payload.clone());
                }
                if !self.video.offer(VideoFrame::new(payload, key)) {
                    tracing::trace!("video queue full, incoming non-key frame shed");
                }
            }
            MediaEvent::Audio(payload) => self.audio.offer(payload),
            MediaEvent::AudioConfig(blob) => self.cache.set_audio_config(blob),
            MediaEvent::Dimension(dim) => self.cache.set_dimension(dim),
        }
        // Nudge the writer; a full slot means it is already awake.
        let _ = self.wakeup_tx.try_send(());
    }

    /// Select the next packets to send, in priority order: pending video
    /// config, pending audio config, pending dimension, then live frames
    /// interleaved fairly between the two queues. Returns the number of
    /// packets appended.
    pub fn drain(&self, out: &mut Vec<Packet>) -> usize {
        let start = out.len();

        if let Some(blob) = self.cache.take_pending_video_config() {
            out.push(Packet::video_config(blob));
        }
        if let Some(blob) = self.cache.take_pending_audio_config() {
            out.push(Packet::audio_config(blob));
        }
        if let Some(dim) = self.cache.take_pending_dimension() {
            out.push(Packet::dimension(dim));
        }

        let mut video_taken = 0;
        let mut audio_taken = 0;
        loop {
            let mut progressed = false;
            if video_taken < self.interleave_batch {
                match self.video.pop() {
                    Some(frame) => {
                        if frame.key {
                            self.key_frames_drained.fetch_add(1, Ordering::Relaxed);
                        }
                        out.push(Packet::video(frame.payload));
                        video_taken += 1;
                        progressed = true;
                    }
                    None => video_taken = self.interleave_batch,
                }
            }
            if audio_taken < self.interleave_batch {
                match self.audio.pop() {
                    Some(payload) => {
                        out.push(Packet::audio(payload));
                        audio_taken += 1;
                        progressed = true;
                    }
                    None => audio_taken = self.interleave_batch,
                }
            }
            if !progressed {
                break;
            }
        }

        out.len() - start
    }

    /// Clear queues and pending markers for a dead session. Caches stay:
    /// they are replayed to the next client from [`Multiplexer::snapshot`].
    pub fn reset_session(&self) {
        self.video.clear();
        self.audio.clear();
        self.cache.clear_pending();
        self.session_resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Accept-time copy of the session-defining blobs
    pub fn snapshot(&self) -> CacheSnapshot {
        self.cache.snapshot()
    }

    /// Last announced dimension, if any
    pub fn dimension(&self) -> Option<Dimension> {
        self.cache.dimension()
    }

    /// Channel the transport writer parks on between drain ticks
    pub fn wakeup_receiver(&self) -> Receiver<()> {
        self.wakeup_rx.clone()
    }

    /// Total key-tagged frames handed to the writer so far
    pub fn key_frames_drained(&self) -> u64 {
        self.key_frames_drained.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> MuxStats {
        MuxStats {
            video: self.video.stats(),
            audio: self.audio.stats(),
            key_frames_drained: self.key_frames_drained.load(Ordering::Relaxed),
            session_resets: self.session_resets.load(Ordering::Relaxed),
        }
    }

    /// Direct submit helpers for façades that do not build [`MediaEvent`]s
    pub fn submit_video(&self, payload: Bytes, key: bool) {
        self.submit(MediaEvent::Video { payload, key });
    }

    pub fn submit_audio(&self, payload: Bytes) {
        self.submit(MediaEvent::Audio(payload));
    }

    pub fn submit_video_config(&self, blob: Bytes) {
        self.submit(MediaEvent::VideoConfig(blob));
    }

    pub fn submit_audio_config(&self, blob: Bytes) {
        self.submit(MediaEvent::AudioConfig(blob));
    }

    pub fn submit_dimension(&self, dim: Dimension) {
        self.submit(MediaEvent::Dimension(dim));
    }
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new()
    }
}
