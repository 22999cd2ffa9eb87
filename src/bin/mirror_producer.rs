//! Mirror Producer Application
//!
//! Serves a synthetic test-pattern A/V stream so a consumer can be
//! exercised without real capture or codec engines. Real deployments
//! replace the synthetic source with capture/encoder façades.

use anyhow::Result;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use screen_reflect::{
    config::AppConfig,
    discovery::{LogOnlyAdvertiser, ServiceAdvertiser, SERVICE_TYPE},
    media::SyntheticSource,
    pipeline::MirrorProducer,
    protocol::Dimension,
};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Screen Reflect producer");

    let mut config = AppConfig::default();
    if let Some(port) = std::env::args().nth(1) {
        config.network.port = port.parse()?;
    }

    let mut source = SyntheticSource::new(Dimension::new(1280, 720));
    let mut producer = MirrorProducer::new(&config);
    producer.set_encoder_handle(Arc::new(source.encoder_handle()));

    let port = producer.start()?;
    tracing::info!(port, service_type = SERVICE_TYPE, "producer listening");

    let mut advertiser = LogOnlyAdvertiser::default();
    if let Some(announcement) = producer.announcement("Screen Reflect Producer") {
        advertiser.advertise(&announcement)?;
    }

    // Synthetic cadence: 60 fps video, 100 fps audio.
    let video_interval = Duration::from_micros(16_667);
    let audio_interval = Duration::from_millis(10);
    let mut next_video = Instant::now();
    let mut next_audio = Instant::now();
    let mut last_stats = Instant::now();

    tracing::info!("Streaming test pattern - press Ctrl+C to stop");

    loop {
        let now = Instant::now();

        if now >= next_video {
            for event in source.next_video() {
                producer.submit(event);
            }
            next_video += video_interval;
        }

        if now >= next_audio {
            producer.submit(source.next_audio());
            next_audio += audio_interval;
        }

        if last_stats.elapsed() >= Duration::from_secs(5) {
            last_stats = Instant::now();
            let mux = producer.mux_stats();
            let server = producer.server_stats();
            tracing::info!(
                "Stats: {} packets sent ({:.1} KB), video queue {}/{} ({} dropped), audio queue {}/{} ({} dropped), {} sessions",
                server.packets_sent,
                server.bytes_sent as f64 / 1024.0,
                mux.video.len,
                mux.video.capacity,
                mux.video.dropped,
                mux.audio.len,
                mux.audio.capacity,
                mux.audio.dropped,
                server.sessions_accepted,
            );
        }

        thread::sleep(Duration::from_millis(1));
    }
}
