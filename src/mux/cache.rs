//! Session-defining blob cache
//!
//! The producer remembers the last video/audio config, the last key
//! frame and the last announced dimension, and replays them to every new
//! consumer so mid-stream joins can start decoding immediately.
//!
//! Each blob sits under its own short mutex; readers see a consistent
//! snapshot per blob. Consistency across blobs is not required since each
//! has independent semantics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use bytes::Bytes;

use crate::protocol::Dimension;

/// Point-in-time copy of all cached blobs, taken at client accept
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    pub video_config: Option<Bytes>,
    pub audio_config: Option<Bytes>,
    pub key_frame: Option<Bytes>,
    pub dimension: Option<Dimension>,
}

/// Last-writer-wins cache of session-defining blobs
///
/// Written only by the multiplexer on `submit`; read by the transport
/// writer at accept time and whenever a pending marker is consumed.
#[derive(Default)]
pub struct SessionCache {
    video_config: Mutex<Option<Bytes>>,
    audio_config: Mutex<Option<Bytes>>,
    key_frame: Mutex<Option<Bytes>>,
    dimension: Mutex<Option<Dimension>>,

    // Pending-to-transmit markers for the current session; consumed by
    // drain, cleared wholesale on session reset.
    video_config_pending: AtomicBool,
    audio_config_pending: AtomicBool,
    dimension_pending: AtomicBool,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_video_config(&self, blob: Bytes) {
        *self.video_config.lock().unwrap() = Some(blob);
        self.video_config_pending.store(true, Ordering::Release);
    }

    pub fn set_audio_config(&self, blob: Bytes) {
        *self.audio_config.lock().unwrap() = Some(blob);
        self.audio_config_pending.store(true, Ordering::Release);
    }

    pub fn set_dimension(&self, dim: Dimension) {
        *self.dimension.lock().unwrap() = Some(dim);
        self.dimension_pending.store(true, Ordering::Release);
    }

    /// Key frames replace the cached recovery point but carry no pending
    /// marker: the frame itself travels through the live video queue, and
    /// the cache is only replayed at accept time.
    pub fn set_key_frame(&self, blob: Bytes) {
        *self.key_frame.lock().unwrap() = Some(blob);
    }

    pub fn has_key_frame(&self) -> bool {
        self.key_frame.lock().unwrap().is_some()
    }

    pub fn dimension(&self) -> Option<Dimension> {
        *self.dimension.lock().unwrap()
    }

    /// Copy every blob for accept-time replay
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            video_config: self.video_config.lock().unwrap().clone(),
            audio_config: self.audio_config.lock().unwrap().clone(),
            key_frame: self.key_frame.lock().unwrap().clone(),
            dimension: *self.dimension.lock().unwrap(),
        }
    }

    /// Consume the pending video-config marker, returning the blob to send
    pub fn take_pending_video_config(&self) -> Option<Bytes> {
        if self.video_config_pending.swap(false, Ordering::AcqRel) {
            self.video_config.lock().unwrap().clone()
        } else {
            None
        }
    }

    /// Consume the pending audio-config marker
    pub fn take_pending_audio_config(&self) -> Option<Bytes> {
        if self.audio_config_pending.swap(false, Ordering::AcqRel) {
            self.audio_config.lock().unwrap().clone()
        } else {
            None
        }
    }

    /// Consume the pending dimension marker
    pub fn take_pending_dimension(&self) -> Option<Dimension> {
        if self.dimension_pending.swap(false, Ordering::AcqRel) {
            *self.dimension.lock().unwrap()
        } else {
            None
        }
    }

    /// Forget pending markers for a dead session. The blobs themselves
    /// survive: the next accept replays them from the snapshot.
    pub fn clear_pending(&self) {
        self.video_config_pending.store(false, Ordering::Release);
        self.audio_config_pending.store(false, Ordering::Release);
        self.dimension_pending.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_last_writer() {
        let cache = SessionCache::new();
        cache.set_video_config(Bytes::from_static(&[1]));
        cache.set_video_config(Bytes::from_static(&[2]));
        cache.set_key_frame(Bytes::from_static(&[9, 9]));
        cache.set_dimension(Dimension::new(1280, 720));

        let snap = cache.snapshot();
        assert_eq!(snap.video_config.unwrap()[0], 2);
        assert!(snap.audio_config.is_none());
        assert_eq!(snap.key_frame.unwrap().len(), 2);
        assert_eq!(snap.dimension.unwrap(), Dimension::new(1280, 720));
    }

    #[test]
    fn test_pending_consumed_once() {
        let cache = SessionCache::new();
        cache.set_audio_config(Bytes::from_static(&[0x11, 0x90]));

        assert!(cache.take_pending_audio_config().is_some());
        assert!(cache.take_pending_audio_config().is_none());

        // Blob stays available for the next accept.
        assert!(cache.snapshot().audio_config.is_some());
    }

    #[test]
    fn test_clear_pending_keeps_blobs() {
        let cache = SessionCache::new();
        cache.set_video_config(Bytes::from_static(&[1]));
        cache.set_dimension(Dimension::new(640, 480));
        cache.clear_pending();

        assert!(cache.take_pending_video_config().is_none());
        assert!(cache.take_pending_dimension().is_none());
        let snap = cache.snapshot();
        assert!(snap.video_config.is_some());
        assert!(snap.dimension.is_some());
    }
}
