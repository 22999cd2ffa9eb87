//! Transport client (consumer side)
//!
//! Connects to a producer endpoint, owns the receive pipeline and hands
//! the framed stream to the parser. State transitions and the last error
//! are observable; `disconnect` is idempotent.

use std::io::BufReader;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::{ConsumerConfig, NetworkConfig};
use crate::discovery::Endpoint;
use crate::error::{Error, Result, TransportError};
use crate::media::StreamSink;
use crate::observer::Observable;
use crate::transport::parser::{ParserCounters, ParserStats, StreamParser};
use crate::transport::socket::tune_consumer_stream;

/// Client lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Receiving,
    Disconnected,
}

struct ClientShared {
    state: Observable<ConnectionState>,
    last_error: Mutex<Option<String>>,
    running: AtomicBool,
    active_stream: Mutex<Option<TcpStream>>,
    counters: Arc<ParserCounters>,
}

/// Consumer transport endpoint
pub struct TransportClient {
    shared: Arc<ClientShared>,
    thread: Option<JoinHandle<()>>,
    network: NetworkConfig,
    consumer: ConsumerConfig,
}

impl TransportClient {
    pub fn new(network: NetworkConfig, consumer: ConsumerConfig) -> Self {
        let shared = ClientShared {
            state: Observable::new(),
            last_error: Mutex::new(None),
            running: AtomicBool::new(false),
            active_stream: Mutex::new(None),
            counters: Arc::new(ParserCounters::default()),
        };
        shared.state.publish(ConnectionState::Idle);
        Self {
            shared: Arc::new(shared),
            thread: None,
            network,
            consumer,
        }
    }

    /// Establish a session and run the receive loop on a background
    /// thread. The sink is reset before the first byte is read.
    pub fn connect(&mut self, endpoint: Endpoint, mut sink: Box<dyn StreamSink>) -> Result<()> {
        if self.shared.running.load(Ordering::Acquire) {
            return Err(TransportError::AlreadyRunning.into());
        }
        // Reap a finished reader from a previous session.
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }

        self.shared.running.store(true, Ordering::Release);
        *self.shared.last_error.lock().unwrap() = None;
        self.shared.state.publish(ConnectionState::Connecting);

        let shared = self.shared.clone();
        let timeout = Duration::from_millis(self.network.connect_timeout_ms);
        let max_payload_len = self.consumer.effective_max_payload_len();
        let handle = thread::Builder::new()
            .name("transport-reader".to_string())
            .spawn(move || {
                receive_session(&shared, endpoint, timeout, max_payload_len, sink.as_mut());
                shared.running.store(false, Ordering::Release);
                *shared.active_stream.lock().unwrap() = None;
                shared.state.publish(ConnectionState::Disconnected);
            })
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
        self.thread = Some(handle);
        Ok(())
    }

    /// Cancel the reader and wait for it to exit. Safe to call at any
    /// time, any number of times.
    pub fn disconnect(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(stream) = self.shared.active_stream.lock().unwrap().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.get().unwrap_or(ConnectionState::Idle)
    }

    /// Connection-state observable for UI surfaces
    pub fn state_observable(&self) -> &Observable<ConnectionState> {
        &self.shared.state
    }

    /// Human-readable cause of the last session end, if it was an error
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().unwrap().clone()
    }

    pub fn stats(&self) -> ParserStats {
        self.shared.counters.snapshot()
    }
}

impl Drop for TransportClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn receive_session(
    shared: &ClientShared,
    endpoint: Endpoint,
    timeout: Duration,
    max_payload_len: usize,
    sink: &mut dyn StreamSink,
) {
    let stream = match open_stream(&endpoint, timeout) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(%endpoint, "connect failed: {e}");
            *shared.last_error.lock().unwrap() = Some(e.to_string());
            return;
        }
    };
    if let Err(e) = tune_consumer_stream(&stream) {
        tracing::warn!(%endpoint, "socket tuning failed: {e}");
    }
    *shared.active_stream.lock().unwrap() = stream.try_clone().ok();

    // Known-empty decoders before the first byte of the session.
    sink.reset();
    shared.state.publish(ConnectionState::Receiving);
    tracing::info!(%endpoint, "receiving");

    let mut parser = StreamParser::with_counters(max_payload_len, shared.counters.clone());
    let reader = BufReader::with_capacity(64 * 1024, stream);
    match parser.run(reader, sink) {
        Ok(()) => tracing::info!(%endpoint, "producer closed the stream"),
        Err(e) => {
            if shared.running.load(Ordering::Acquire) {
                tracing::warn!(%endpoint, "session failed: {e}");
                *shared.last_error.lock().unwrap() = Some(e.to_string());
            } else {
                // Deliberate disconnect; the read error is expected.
                tracing::debug!(%endpoint, "reader cancelled");
            }
        }
    }
}

fn open_stream(endpoint: &Endpoint, timeout: Duration) -> std::result::Result<TcpStream, Error> {
    let addr = endpoint.resolve()?;
    TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| TransportError::ConnectFailed(e.to_string()).into())
}
