//! Bounded live-frame queues with non-blocking offer
//!
//! The encoder side never blocks: on overflow each queue sheds load
//! according to its policy. Audio keeps freshness (drop oldest); video
//! keeps both freshness and recoverability (never evict the only key
//! frame for a non-key frame).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use crossbeam::queue::ArrayQueue;

/// One video access unit waiting to be written
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub payload: Bytes,
    /// Decodable without reference to earlier frames
    pub key: bool,
}

impl VideoFrame {
    pub fn new(payload: Bytes, key: bool) -> Self {
        Self { payload, key }
    }
}

/// Queue counters snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    pub len: usize,
    pub capacity: usize,
    pub enqueued: u64,
    pub dropped: u64,
}

/// Bounded audio queue: lock-free, drop-oldest on overflow
pub struct AudioQueue {
    queue: ArrayQueue<Bytes>,
    enqueued: AtomicU64,
    dropped: AtomicU64,
}

impl AudioQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            enqueued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Offer a frame without blocking. On overflow the oldest frame is
    /// dropped so the stream stays fresh; audio has no inter-frame
    /// dependency at this layer.
    pub fn offer(&self, payload: Bytes) {
        let mut pending = payload;
        loop {
            match self.queue.push(pending) {
                Ok(()) => break,
                Err(rejected) => {
                    pending = rejected;
                    if self.queue.pop().is_some() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pop(&self) -> Option<Bytes> {
        self.queue.pop()
    }

    pub fn clear(&self) {
        while self.queue.pop().is_some() {}
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            len: self.queue.len(),
            capacity: self.queue.capacity(),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Bounded video queue with key-aware eviction
///
/// Eviction must inspect key tags, so this queue uses a short-mutex
/// `VecDeque` instead of a lock-free ring. The critical sections touch a
/// handful of pointers; `offer` never blocks on I/O.
pub struct VideoQueue {
    inner: Mutex<VecDeque<VideoFrame>>,
    capacity: usize,
    enqueued: AtomicU64,
    dropped: AtomicU64,
}

impl VideoQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "video queue capacity must be non-zero");
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            enqueued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Offer a frame without blocking.
    ///
    /// Overflow policy:
    /// - incoming non-key: drop the oldest non-key frame; when only key
    ///   frames are queued, shed the incoming frame instead;
    /// - incoming key: evict the oldest non-key, or the oldest key when
    ///   the queue holds only keys (the new key supersedes it as the
    ///   recovery point).
    ///
    /// Returns `true` when the incoming frame was enqueued.
    pub fn offer(&self, frame: VideoFrame) -> bool {
        let mut queue = self.inner.lock().unwrap();
        if queue.len() < self.capacity {
            queue.push_back(frame);
            self.enqueued.fetch_add(1, Ordering::Relaxed);
            return true;
        }

        self.dropped.fetch_add(1, Ordering::Relaxed);
        let oldest_non_key = queue.iter().position(|f| !f.key);
        match (frame.key, oldest_non_key) {
            (_, Some(idx)) => {
                queue.remove(idx);
            }
            (true, None) => {
                // Only keys queued: the new key supersedes the oldest as
                // the recovery point.
                queue.pop_front();
            }
            (false, None) => {
                // Every queued frame is a recovery point; shed the
                // incoming frame.
                return false;
            }
        }
        queue.push_back(frame);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn pop(&self) -> Option<VideoFrame> {
        self.inner.lock().unwrap().pop_front()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Whether any queued frame is key-tagged
    pub fn holds_key_frame(&self) -> bool {
        self.inner.lock().unwrap().iter().any(|f| f.key)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            len: self.len(),
            capacity: self.capacity,
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u8, key: bool) -> VideoFrame {
        VideoFrame::new(Bytes::from(vec![tag]), key)
    }

    #[test]
    fn test_audio_drop_oldest() {
        let queue = AudioQueue::new(2);
        queue.offer(Bytes::from_static(&[1]));
        queue.offer(Bytes::from_static(&[2]));
        queue.offer(Bytes::from_static(&[3]));

        assert_eq!(queue.pop().unwrap()[0], 2);
        assert_eq!(queue.pop().unwrap()[0], 3);
        assert!(queue.pop().is_none());
        assert_eq!(queue.stats().dropped, 1);
    }

    #[test]
    fn test_video_fifo_under_capacity() {
        let queue = VideoQueue::new(4);
        queue.offer(frame(1, true));
        queue.offer(frame(2, false));
        assert_eq!(queue.pop().unwrap().payload[0], 1);
        assert_eq!(queue.pop().unwrap().payload[0], 2);
        assert_eq!(queue.stats().dropped, 0);
    }

    #[test]
    fn test_video_overflow_drops_oldest_non_key() {
        let queue = VideoQueue::new(2);
        queue.offer(frame(1, false));
        queue.offer(frame(2, false));
        assert!(queue.offer(frame(3, false)));

        assert_eq!(queue.pop().unwrap().payload[0], 2);
        assert_eq!(queue.pop().unwrap().payload[0], 3);
    }

    #[test]
    fn test_video_overflow_drops_oldest_non_key_behind_front_key() {
        let queue = VideoQueue::new(3);
        queue.offer(frame(1, true));
        queue.offer(frame(2, false));
        queue.offer(frame(3, false));
        // Front key survives; the oldest non-key behind it is shed.
        assert!(queue.offer(frame(4, false)));

        let first = queue.pop().unwrap();
        assert!(first.key);
        assert_eq!(first.payload[0], 1);
        assert_eq!(queue.pop().unwrap().payload[0], 3);
        assert_eq!(queue.pop().unwrap().payload[0], 4);
    }

    #[test]
    fn test_video_overflow_all_keys_sheds_incoming_non_key() {
        let queue = VideoQueue::new(2);
        queue.offer(frame(1, true));
        queue.offer(frame(2, true));
        assert!(!queue.offer(frame(3, false)));

        assert_eq!(queue.pop().unwrap().payload[0], 1);
        assert_eq!(queue.pop().unwrap().payload[0], 2);
    }

    #[test]
    fn test_video_incoming_key_evicts_non_key() {
        let queue = VideoQueue::new(2);
        queue.offer(frame(1, true));
        queue.offer(frame(2, false));
        assert!(queue.offer(frame(3, true)));

        assert_eq!(queue.pop().unwrap().payload[0], 1);
        assert_eq!(queue.pop().unwrap().payload[0], 3);
        assert!(!queue.holds_key_frame());
    }

    #[test]
    fn test_video_incoming_key_supersedes_older_key() {
        let queue = VideoQueue::new(2);
        queue.offer(frame(1, true));
        queue.offer(frame(2, true));
        assert!(queue.offer(frame(3, true)));

        assert_eq!(queue.pop().unwrap().payload[0], 2);
        assert_eq!(queue.pop().unwrap().payload[0], 3);
    }

    #[test]
    fn test_video_adversarial_keeps_a_key_reachable() {
        // A full queue fed any mix of frames never loses its last key
        // unless a newer key replaces it.
        let queue = VideoQueue::new(4);
        queue.offer(frame(0, true));
        for tag in 1..100u8 {
            queue.offer(frame(tag, false));
        }
        assert!(queue.holds_key_frame());
    }
}
