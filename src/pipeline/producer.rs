//! Producer-side assembly
//!
//! Owns the multiplexer, the transport server and the encoder handle.
//! Capture and encoder façades talk only to this type: media submission,
//! dimension changes and permission loss all route through here.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::discovery::ServiceAnnouncement;
use crate::error::{MediaError, Result};
use crate::media::{MediaEvent, VideoEncoderHandle};
use crate::mux::{Multiplexer, MuxStats};
use crate::observer::Observable;
use crate::protocol::Dimension;
use crate::transport::{ServerState, ServerStats, TransportServer};

/// Ready-to-run mirror producer
pub struct MirrorProducer {
    mux: Arc<Multiplexer>,
    server: TransportServer,
    encoder: Option<Arc<dyn VideoEncoderHandle>>,
}

impl MirrorProducer {
    pub fn new(config: &AppConfig) -> Self {
        let mux = Arc::new(Multiplexer::with_capacities(
            config.producer.video_queue_capacity,
            config.producer.audio_queue_capacity,
            config.producer.interleave_batch,
        ));
        let server = TransportServer::new(
            mux.clone(),
            config.network.clone(),
            config.producer.clone(),
        );
        Self {
            mux,
            server,
            encoder: None,
        }
    }

    /// Wire in the encoder façade handle. The transport's
    /// client-connected signal and dimension-change key requests go
    /// through it. Must be called before [`MirrorProducer::start`].
    pub fn set_encoder_handle(&mut self, handle: Arc<dyn VideoEncoderHandle>) {
        self.server.set_encoder_handle(handle.clone());
        self.encoder = Some(handle);
    }

    /// Start listening. Returns the bound port for the discovery
    /// advertisement.
    pub fn start(&mut self) -> Result<u16> {
        self.server.start()
    }

    /// Announcement for the discovery advertiser, once started
    pub fn announcement(&self, instance: impl Into<String>) -> Option<ServiceAnnouncement> {
        self.server
            .local_port()
            .map(|port| ServiceAnnouncement::new(instance, port))
    }

    /// Submit one encoder output; forwarded to the multiplexer, never
    /// blocks.
    pub fn submit(&self, event: MediaEvent) {
        self.mux.submit(event);
    }

    /// Capture façade callback for a changed encoded size: announce the
    /// new dimension and ask the encoder for a key frame so the next
    /// frames are decodable at the new size.
    pub fn notify_dimension_change(&self, dimension: Dimension) {
        tracing::info!(%dimension, "encoded dimension changed");
        self.mux.submit_dimension(dimension);
        if let Some(encoder) = &self.encoder {
            encoder.request_key_frame();
        }
    }

    /// Capture or encoder façade lost its OS permission: fatal on the
    /// producer side, the session is torn down and the service stops.
    pub fn permission_lost(&mut self, reason: &str) {
        let error = MediaError::PermissionLoss(reason.to_string());
        tracing::error!("stopping producer: {error}");
        self.server.stop();
    }

    pub fn state(&self) -> ServerState {
        self.server.state()
    }

    pub fn state_observable(&self) -> &Observable<ServerState> {
        self.server.state_observable()
    }

    pub fn mux_stats(&self) -> MuxStats {
        self.mux.stats()
    }

    pub fn server_stats(&self) -> ServerStats {
        self.server.stats()
    }

    pub fn stop(&mut self) {
        self.server.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEncoder(AtomicUsize);
    impl VideoEncoderHandle for CountingEncoder {
        fn request_key_frame(&self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn ephemeral_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.network.port = 0;
        config
    }

    #[test]
    fn test_dimension_change_requests_key_frame() {
        let encoder = Arc::new(CountingEncoder(AtomicUsize::new(0)));
        let mut producer = MirrorProducer::new(&ephemeral_config());
        producer.set_encoder_handle(encoder.clone());

        producer.notify_dimension_change(Dimension::new(720, 1280));

        assert_eq!(encoder.0.load(Ordering::Relaxed), 1);
        // The dimension is cached for replay and pending for the wire.
        let mut out = Vec::new();
        producer.mux.drain(&mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].payload[..], [0x00, 0x00, 0x02, 0xD0, 0x00, 0x00, 0x05, 0x00]);
    }

    #[test]
    fn test_announcement_carries_bound_port() {
        let mut producer = MirrorProducer::new(&ephemeral_config());
        assert!(producer.announcement("Office Mac").is_none());

        let port = producer.start().unwrap();
        let announcement = producer.announcement("Office Mac").unwrap();
        assert_eq!(announcement.port, port);
        assert_eq!(announcement.instance, "Office Mac");
        producer.stop();
    }

    #[test]
    fn test_permission_loss_stops_service() {
        let mut producer = MirrorProducer::new(&ephemeral_config());
        producer.start().unwrap();
        producer.permission_lost("screen recording revoked");
        assert_eq!(producer.state(), ServerState::Stopped);
    }

    #[test]
    fn test_submit_routes_to_mux() {
        let producer = MirrorProducer::new(&ephemeral_config());
        producer.submit(MediaEvent::Video {
            payload: Bytes::from_static(&[0x65]),
            key: true,
        });
        assert!(producer.mux_stats().video.enqueued > 0);
    }
}
