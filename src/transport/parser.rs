//! Stream parser (consumer side)
//!
//! A straight loop over (header, payload) reads: demultiplex the framed
//! byte stream into typed packet events and dispatch them synchronously
//! to the [`StreamSink`]. Unknown kinds are consumed and ignored so newer
//! producers keep working against this consumer.

use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, TransportError};
use crate::media::StreamSink;
use crate::protocol::{Dimension, FrameHeader, PacketKind, HEADER_LEN};

/// Scratch size used to consume unknown-kind payloads without allocating
/// for them
const SKIP_CHUNK: usize = 8 * 1024;

/// Parser counters, shared with the owning transport for stats reporting
#[derive(Debug, Default)]
pub struct ParserCounters {
    pub video_config: AtomicU64,
    pub video: AtomicU64,
    pub audio: AtomicU64,
    pub audio_config: AtomicU64,
    pub dimension: AtomicU64,
    pub skipped_unknown: AtomicU64,
    pub bytes_read: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserStats {
    pub video_config: u64,
    pub video: u64,
    pub audio: u64,
    pub audio_config: u64,
    pub dimension: u64,
    pub skipped_unknown: u64,
    pub bytes_read: u64,
}

impl ParserCounters {
    pub fn snapshot(&self) -> ParserStats {
        ParserStats {
            video_config: self.video_config.load(Ordering::Relaxed),
            video: self.video.load(Ordering::Relaxed),
            audio: self.audio.load(Ordering::Relaxed),
            audio_config: self.audio_config.load(Ordering::Relaxed),
            dimension: self.dimension.load(Ordering::Relaxed),
            skipped_unknown: self.skipped_unknown.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }
}

/// Framed-stream demultiplexer
pub struct StreamParser {
    max_payload_len: usize,
    counters: Arc<ParserCounters>,
    payload_buf: Vec<u8>,
}

impl StreamParser {
    pub fn new(max_payload_len: usize) -> Self {
        Self::with_counters(max_payload_len, Arc::new(ParserCounters::default()))
    }

    /// Parser reusing existing counters, so stats accumulate across
    /// sessions
    pub fn with_counters(max_payload_len: usize, counters: Arc<ParserCounters>) -> Self {
        Self {
            max_payload_len,
            counters,
            payload_buf: Vec::new(),
        }
    }

    /// Shared handle to the counters, valid across sessions
    pub fn counters(&self) -> Arc<ParserCounters> {
        self.counters.clone()
    }

    /// Parse packets until clean EOF (returns `Ok`), peer close mid-frame
    /// (`TransportError::PeerClosed`), or a fatal framing error.
    ///
    /// No decoder dispatch happens for a frame that fails validation.
    pub fn run<R: Read>(&mut self, mut reader: R, sink: &mut dyn StreamSink) -> Result<(), Error> {
        let mut header_buf = [0u8; HEADER_LEN];
        loop {
            if !read_frame_start(&mut reader, &mut header_buf)? {
                return Ok(());
            }
            let header = FrameHeader::parse(&header_buf);
            header.validate(self.max_payload_len)?;
            self.counters
                .bytes_read
                .fetch_add(HEADER_LEN as u64 + header.len as u64, Ordering::Relaxed);

            let Some(kind) = PacketKind::from_wire(header.kind) else {
                tracing::debug!(kind = header.kind, len = header.len, "skipping unknown packet kind");
                skip_payload(&mut reader, header.len as usize)?;
                self.counters.skipped_unknown.fetch_add(1, Ordering::Relaxed);
                continue;
            };

            self.payload_buf.resize(header.len as usize, 0);
            read_exact_frame(&mut reader, &mut self.payload_buf)?;
            self.dispatch(kind, sink)?;
        }
    }

    fn dispatch(&mut self, kind: PacketKind, sink: &mut dyn StreamSink) -> Result<(), Error> {
        match kind {
            PacketKind::VideoConfig => {
                self.counters.video_config.fetch_add(1, Ordering::Relaxed);
                sink.on_video_config(&self.payload_buf);
            }
            PacketKind::Video => {
                self.counters.video.fetch_add(1, Ordering::Relaxed);
                sink.on_video(&self.payload_buf);
            }
            PacketKind::Audio => {
                self.counters.audio.fetch_add(1, Ordering::Relaxed);
                sink.on_audio(&self.payload_buf);
            }
            PacketKind::AudioConfig => {
                self.counters.audio_config.fetch_add(1, Ordering::Relaxed);
                sink.on_audio_config(&self.payload_buf);
            }
            PacketKind::Dimension => {
                let dimension = Dimension::decode(&self.payload_buf)?;
                self.counters.dimension.fetch_add(1, Ordering::Relaxed);
                sink.on_dimension(dimension);
            }
        }
        Ok(())
    }
}

/// Read a full header, distinguishing clean EOF at a frame boundary
/// (returns `Ok(false)`) from a peer close inside the header.
fn read_frame_start<R: Read>(reader: &mut R, buf: &mut [u8; HEADER_LEN]) -> Result<bool, Error> {
    let mut filled = 0;
    while filled < HEADER_LEN {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(false);
                }
                return Err(TransportError::PeerClosed.into());
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

/// Read an exact payload; EOF here means the peer closed mid-frame
fn read_exact_frame<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), Error> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(TransportError::PeerClosed.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Consume `len` bytes of an unknown-kind payload in bounded chunks
fn skip_payload<R: Read>(reader: &mut R, len: usize) -> Result<(), Error> {
    let mut remaining = len;
    let mut scratch = [0u8; SKIP_CHUNK];
    while remaining > 0 {
        let take = remaining.min(SKIP_CHUNK);
        read_exact_frame(reader, &mut scratch[..take])?;
        remaining -= take;
    }
    Ok(())
}
