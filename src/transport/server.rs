//! Transport server (producer side)
//!
//! Owns the listening endpoint, accepts one consumer session at a time,
//! replays the session-defining caches on accept and then drains the
//! multiplexer into the socket. A write error ends the session and
//! returns the server to listening; shutdown stops it for good.

use std::io::{BufWriter, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::{NetworkConfig, ProducerConfig};
use crate::constants::ACCEPT_POLL_INTERVAL_MS;
use crate::error::{Result, TransportError};
use crate::media::VideoEncoderHandle;
use crate::mux::Multiplexer;
use crate::observer::Observable;
use crate::protocol::{write_packet, Packet, HEADER_LEN};
use crate::transport::socket::tune_producer_stream;

/// Server lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Listening,
    Serving,
    Stopped,
}

#[derive(Debug, Default)]
struct ServerCounters {
    sessions_accepted: AtomicU64,
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    write_errors: AtomicU64,
    watchdog_trips: AtomicU64,
}

/// Server counters snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerStats {
    pub sessions_accepted: u64,
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub write_errors: u64,
    pub watchdog_trips: u64,
}

struct ServerShared {
    mux: Arc<Multiplexer>,
    encoder: Mutex<Option<Arc<dyn VideoEncoderHandle>>>,
    network: NetworkConfig,
    producer: ProducerConfig,
    state: Observable<ServerState>,
    running: AtomicBool,
    active_stream: Mutex<Option<TcpStream>>,
    counters: ServerCounters,
}

/// Producer transport endpoint
pub struct TransportServer {
    shared: Arc<ServerShared>,
    thread: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl TransportServer {
    pub fn new(mux: Arc<Multiplexer>, network: NetworkConfig, producer: ProducerConfig) -> Self {
        let shared = ServerShared {
            mux,
            encoder: Mutex::new(None),
            network,
            producer,
            state: Observable::new(),
            running: AtomicBool::new(false),
            active_stream: Mutex::new(None),
            counters: ServerCounters::default(),
        };
        shared.state.publish(ServerState::Idle);
        Self {
            shared: Arc::new(shared),
            thread: None,
            local_addr: None,
        }
    }

    /// Attach the encoder façade handle that receives the
    /// client-connected key-frame request.
    pub fn set_encoder_handle(&mut self, handle: Arc<dyn VideoEncoderHandle>) {
        *self.shared.encoder.lock().unwrap() = Some(handle);
    }

    /// Bind the listener and start the accept/writer thread. Returns the
    /// bound port (useful with port 0).
    pub fn start(&mut self) -> Result<u16> {
        if self.thread.is_some() {
            return Err(TransportError::AlreadyRunning.into());
        }

        let listener = TcpListener::bind(("0.0.0.0", self.shared.network.port))
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        self.local_addr = Some(local_addr);

        self.shared.running.store(true, Ordering::Release);
        self.shared.state.publish(ServerState::Listening);
        tracing::info!(port = local_addr.port(), "transport server listening");

        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name("transport-server".to_string())
            .spawn(move || accept_loop(&shared, listener))
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        self.thread = Some(handle);
        Ok(local_addr.port())
    }

    /// Bound port after a successful start
    pub fn local_port(&self) -> Option<u16> {
        self.local_addr.map(|a| a.port())
    }

    pub fn state(&self) -> ServerState {
        self.shared.state.get().unwrap_or(ServerState::Idle)
    }

    /// Lifecycle observable for UI surfaces
    pub fn state_observable(&self) -> &Observable<ServerState> {
        &self.shared.state
    }

    pub fn stats(&self) -> ServerStats {
        let c = &self.shared.counters;
        ServerStats {
            sessions_accepted: c.sessions_accepted.load(Ordering::Relaxed),
            packets_sent: c.packets_sent.load(Ordering::Relaxed),
            bytes_sent: c.bytes_sent.load(Ordering::Relaxed),
            write_errors: c.write_errors.load(Ordering::Relaxed),
            watchdog_trips: c.watchdog_trips.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting, end the live session and join the thread.
    /// Idempotent.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(stream) = self.shared.active_stream.lock().unwrap().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TransportServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(shared: &ServerShared, listener: TcpListener) {
    let poll = Duration::from_millis(ACCEPT_POLL_INTERVAL_MS);
    while shared.running.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, peer)) => {
                // The listener polls non-blocking; the session socket
                // must block on writes.
                if let Err(e) = stream.set_nonblocking(false) {
                    tracing::warn!(%peer, "failed to prepare accepted socket: {e}");
                    continue;
                }
                tracing::info!(%peer, "consumer connected");
                shared.state.publish(ServerState::Serving);
                serve_session(shared, stream, peer);
                if shared.running.load(Ordering::Acquire) {
                    tracing::info!(%peer, "session ended, listening again");
                    shared.state.publish(ServerState::Listening);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => thread::sleep(poll),
            Err(e) => {
                tracing::warn!("accept failed: {e}");
                thread::sleep(poll);
            }
        }
    }
    shared.state.publish(ServerState::Stopped);
}

/// One accepted-client session: cache replay, encoder signal, drain loop.
fn serve_session(shared: &ServerShared, stream: TcpStream, peer: SocketAddr) {
    if let Err(e) = tune_producer_stream(&stream, shared.network.send_buffer_size) {
        tracing::warn!(%peer, "socket tuning failed: {e}");
    }
    *shared.active_stream.lock().unwrap() = stream.try_clone().ok();

    // Anything queued for a previous client must never reach this one.
    shared.mux.reset_session();
    shared.counters.sessions_accepted.fetch_add(1, Ordering::Relaxed);

    let accepted_at = Instant::now();
    let key_drained_base = shared.mux.key_frames_drained();
    let snapshot = shared.mux.snapshot();
    let replayed_key = snapshot.key_frame.is_some();

    let mut writer = BufWriter::with_capacity(64 * 1024, stream);
    if let Err(e) = replay_caches(shared, &snapshot, &mut writer) {
        end_session(shared, peer, Some(TransportError::SendFailed(e.to_string())));
        return;
    }

    let wakeup = shared.mux.wakeup_receiver();
    let poll = Duration::from_millis(shared.producer.writer_poll_interval_ms);
    let watchdog = Duration::from_millis(shared.producer.key_frame_watchdog_ms);
    let mut watchdog_armed = true;
    let mut batch: Vec<Packet> = Vec::with_capacity(16);

    while shared.running.load(Ordering::Acquire) {
        batch.clear();
        shared.mux.drain(&mut batch);

        if batch.is_empty() {
            // Park until a submit nudges us or the poll interval expires;
            // this coalesces config/control updates without busy-spinning.
            let _ = wakeup.recv_timeout(poll);
        } else if let Err(e) = write_batch(shared, &mut writer, &batch) {
            end_session(shared, peer, Some(TransportError::SendFailed(e.to_string())));
            return;
        }

        if watchdog_armed && accepted_at.elapsed() >= watchdog {
            watchdog_armed = false;
            if !replayed_key && shared.mux.key_frames_drained() == key_drained_base {
                shared.counters.watchdog_trips.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    %peer,
                    window_ms = watchdog.as_millis() as u64,
                    "no key frame sent since client connect; encoder façade may be ignoring requests"
                );
            }
        }
    }
    end_session(shared, peer, None);
}

/// Accept-time replay, strictly ordered before any live frame:
/// VideoConfig, AudioConfig, cached KeyFrame (as a Video packet), the
/// client-connected signal to the encoder, then a fresh Dimension
/// reflecting the current encoded size.
fn replay_caches(
    shared: &ServerShared,
    snapshot: &crate::mux::CacheSnapshot,
    writer: &mut BufWriter<TcpStream>,
) -> std::io::Result<()> {
    let mut replayed = 0u64;

    if let Some(blob) = &snapshot.video_config {
        send_packet(shared, writer, Packet::video_config(blob.clone()))?;
        replayed += 1;
    }
    if let Some(blob) = &snapshot.audio_config {
        send_packet(shared, writer, Packet::audio_config(blob.clone()))?;
        replayed += 1;
    }
    if let Some(blob) = &snapshot.key_frame {
        send_packet(shared, writer, Packet::video(blob.clone()))?;
        replayed += 1;
    }

    // The encoder may now produce a fresh key frame for this session.
    if let Some(encoder) = shared.encoder.lock().unwrap().clone() {
        encoder.request_key_frame();
    }

    if let Some(dim) = shared.mux.dimension() {
        send_packet(shared, writer, Packet::dimension(dim))?;
        replayed += 1;
    }
    writer.flush()?;
    tracing::debug!(packets = replayed, "session caches replayed");
    Ok(())
}

fn send_packet(
    shared: &ServerShared,
    writer: &mut BufWriter<TcpStream>,
    packet: Packet,
) -> std::io::Result<()> {
    let wire_len = HEADER_LEN as u64 + packet.len() as u64;
    write_packet(writer, &packet)?;
    shared.counters.packets_sent.fetch_add(1, Ordering::Relaxed);
    shared.counters.bytes_sent.fetch_add(wire_len, Ordering::Relaxed);
    Ok(())
}

fn write_batch(
    shared: &ServerShared,
    writer: &mut BufWriter<TcpStream>,
    batch: &[Packet],
) -> std::io::Result<()> {
    for packet in batch {
        write_packet(writer, packet)?;
        shared.counters.packets_sent.fetch_add(1, Ordering::Relaxed);
        shared
            .counters
            .bytes_sent
            .fetch_add(HEADER_LEN as u64 + packet.len() as u64, Ordering::Relaxed);
    }
    // Opportunistic flush once per drain batch.
    writer.flush()
}

fn end_session(shared: &ServerShared, peer: SocketAddr, error: Option<TransportError>) {
    if let Some(e) = error {
        shared.counters.write_errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(%peer, "session failed: {e}");
    }
    *shared.active_stream.lock().unwrap() = None;
    // Clears pending-to-transmit markers for whatever session comes next.
    shared.mux.reset_session();
}
