//! Mirror Consumer Application
//!
//! Connects to a producer (discovery override via `host:port` argument)
//! and runs the stream into logging decoder façades. Real deployments
//! replace those with H.264/AAC decoders and a render surface.

use anyhow::Result;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use screen_reflect::{
    config::AppConfig,
    constants::DEFAULT_TCP_PORT,
    discovery::Endpoint,
    error::MediaError,
    media::{AudioDecoder, VideoDecoder},
    pipeline::MirrorConsumer,
    transport::ConnectionState,
};

/// Decoder façade that validates ordering and logs progress
struct LoggingDecoder {
    label: &'static str,
    configured: bool,
    frames: u64,
}

impl LoggingDecoder {
    fn new(label: &'static str) -> Self {
        Self {
            label,
            configured: false,
            frames: 0,
        }
    }

    fn handle_configure(&mut self, config: &[u8]) -> std::result::Result<(), MediaError> {
        tracing::info!("{} decoder configured ({} bytes)", self.label, config.len());
        self.configured = true;
        Ok(())
    }

    fn handle_decode(&mut self, data: &[u8]) -> std::result::Result<(), MediaError> {
        if !self.configured {
            return Err(MediaError::MissingConfig);
        }
        self.frames += 1;
        if self.frames == 1 || self.frames % 300 == 0 {
            tracing::info!("{} frame {} ({} bytes)", self.label, self.frames, data.len());
        }
        Ok(())
    }

    fn handle_reset(&mut self) {
        self.configured = false;
        self.frames = 0;
    }
}

impl VideoDecoder for LoggingDecoder {
    fn configure(&mut self, config: &[u8]) -> std::result::Result<(), MediaError> {
        self.handle_configure(config)
    }
    fn decode(&mut self, access_unit: &[u8]) -> std::result::Result<(), MediaError> {
        self.handle_decode(access_unit)
    }
    fn reset(&mut self) {
        self.handle_reset();
    }
}

impl AudioDecoder for LoggingDecoder {
    fn configure(&mut self, config: &[u8]) -> std::result::Result<(), MediaError> {
        self.handle_configure(config)
    }
    fn decode(&mut self, frame: &[u8]) -> std::result::Result<(), MediaError> {
        self.handle_decode(frame)
    }
    fn reset(&mut self) {
        self.handle_reset();
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Screen Reflect consumer");

    let endpoint: Endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("127.0.0.1:{DEFAULT_TCP_PORT}"))
        .parse()?;

    let config = AppConfig::default();
    let mut consumer = MirrorConsumer::new(&config);
    let dimensions = consumer.dimension_observable().subscribe();
    let states = consumer.state_observable().subscribe();

    tracing::info!(%endpoint, "connecting");
    consumer.connect(
        endpoint,
        Box::new(LoggingDecoder::new("video")),
        Box::new(LoggingDecoder::new("audio")),
    )?;

    let mut last_stats = Instant::now();
    loop {
        while let Ok(dimension) = dimensions.try_recv() {
            tracing::info!(%dimension, "presentation size changed");
        }
        while let Ok(state) = states.try_recv() {
            tracing::info!(?state, "connection state");
        }

        if consumer.state() == ConnectionState::Disconnected {
            match consumer.last_error() {
                Some(error) => tracing::error!("session ended: {error}"),
                None => tracing::info!("session ended"),
            }
            break;
        }

        if last_stats.elapsed() >= Duration::from_secs(5) {
            last_stats = Instant::now();
            let stats = consumer.stats();
            tracing::info!(
                "Stats: {} video / {} audio frames, {} config updates, {} dimension updates, {} unknown skipped, {:.1} KB read",
                stats.video,
                stats.audio,
                stats.video_config + stats.audio_config,
                stats.dimension,
                stats.skipped_unknown,
                stats.bytes_read as f64 / 1024.0,
            );
        }

        thread::sleep(Duration::from_millis(20));
    }

    Ok(())
}
