//! Consumer-side assembly
//!
//! Bridges the transport client to the decoder façades and fans
//! dimension updates out to observers. Decode failures before a config
//! arrives are the expected cache-miss case and never end the session.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::discovery::Endpoint;
use crate::error::Result;
use crate::media::{AudioDecoder, StreamSink, VideoDecoder};
use crate::observer::Observable;
use crate::protocol::Dimension;
use crate::transport::{ConnectionState, ParserStats, TransportClient};

/// Ready-to-run mirror consumer
pub struct MirrorConsumer {
    client: TransportClient,
    dimension: Arc<Observable<Dimension>>,
}

impl MirrorConsumer {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: TransportClient::new(config.network.clone(), config.consumer.clone()),
            dimension: Arc::new(Observable::new()),
        }
    }

    /// Connect to a producer and run the session against the given
    /// decoder façades.
    pub fn connect(
        &mut self,
        endpoint: Endpoint,
        video: Box<dyn VideoDecoder>,
        audio: Box<dyn AudioDecoder>,
    ) -> Result<()> {
        let sink = DecoderSink::new(video, audio, self.dimension.clone());
        self.client.connect(endpoint, Box::new(sink))
    }

    /// Idempotent session cancel
    pub fn disconnect(&mut self) {
        self.client.disconnect();
    }

    pub fn state(&self) -> ConnectionState {
        self.client.state()
    }

    pub fn state_observable(&self) -> &Observable<ConnectionState> {
        self.client.state_observable()
    }

    /// Fires with (width, height) whenever the producer announces a new
    /// encoded size
    pub fn dimension_observable(&self) -> &Observable<Dimension> {
        &self.dimension
    }

    pub fn last_error(&self) -> Option<String> {
        self.client.last_error()
    }

    pub fn stats(&self) -> ParserStats {
        self.client.stats()
    }
}

/// Routes parsed packets into the decoder façades
struct DecoderSink {
    video: Box<dyn VideoDecoder>,
    audio: Box<dyn AudioDecoder>,
    dimension: Arc<Observable<Dimension>>,
}

impl DecoderSink {
    fn new(
        video: Box<dyn VideoDecoder>,
        audio: Box<dyn AudioDecoder>,
        dimension: Arc<Observable<Dimension>>,
    ) -> Self {
        Self {
            video,
            audio,
            dimension,
        }
    }
}

impl StreamSink for DecoderSink {
    fn on_video_config(&mut self, config: &[u8]) {
        if let Err(e) = self.video.configure(config) {
            tracing::warn!("video decoder rejected config: {e}");
        }
    }

    fn on_video(&mut self, access_unit: &[u8]) {
        if let Err(e) = self.video.decode(access_unit) {
            // Expected until a config+key pair lands on a fresh join.
            tracing::debug!("video decode failed: {e}");
        }
    }

    fn on_audio_config(&mut self, config: &[u8]) {
        if let Err(e) = self.audio.configure(config) {
            tracing::warn!("audio decoder rejected config: {e}");
        }
    }

    fn on_audio(&mut self, frame: &[u8]) {
        if let Err(e) = self.audio.decode(frame) {
            tracing::debug!("audio decode failed: {e}");
        }
    }

    fn on_dimension(&mut self, dimension: Dimension) {
        tracing::debug!(%dimension, "dimension update");
        self.dimension.publish(dimension);
    }

    fn reset(&mut self) {
        self.video.reset();
        self.audio.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubState {
        configured: AtomicUsize,
        decoded: AtomicUsize,
        resets: AtomicUsize,
    }

    struct StubDecoder {
        state: Arc<StubState>,
        configured: bool,
    }

    impl StubDecoder {
        fn new(state: Arc<StubState>) -> Self {
            Self {
                state,
                configured: false,
            }
        }

        fn handle_configure(&mut self, _config: &[u8]) -> std::result::Result<(), MediaError> {
            self.configured = true;
            self.state.configured.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn handle_decode(&mut self, _data: &[u8]) -> std::result::Result<(), MediaError> {
            if !self.configured {
                return Err(MediaError::MissingConfig);
            }
            self.state.decoded.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn handle_reset(&mut self) {
            self.configured = false;
            self.state.resets.fetch_add(1, Ordering::Relaxed);
        }
    }

    impl VideoDecoder for StubDecoder {
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

    impl AudioDecoder for StubDecoder {
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

    fn sink_with_stubs() -> (DecoderSink, Arc<StubState>, Arc<StubState>) {
        let video_state = Arc::new(StubState::default());
        let audio_state = Arc::new(StubState::default());
        let sink = DecoderSink::new(
            Box::new(StubDecoder::new(video_state.clone())),
            Box::new(StubDecoder::new(audio_state.clone())),
            Arc::new(Observable::new()),
        );
        (sink, video_state, audio_state)
    }

    #[test]
    fn test_cache_miss_does_not_end_session() {
        let (mut sink, video, _) = sink_with_stubs();
        // Video before config: decoder fails, the sink keeps going.
        sink.on_video(&[0x41]);
        assert_eq!(video.decoded.load(Ordering::Relaxed), 0);

        sink.on_video_config(&[0x67]);
        sink.on_video(&[0x65]);
        assert_eq!(video.decoded.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_reset_returns_decoders_to_empty() {
        let (mut sink, video, audio) = sink_with_stubs();
        sink.on_video_config(&[0x67]);
        sink.on_audio_config(&[0x11]);
        sink.reset();

        assert_eq!(video.resets.load(Ordering::Relaxed), 1);
        assert_eq!(audio.resets.load(Ordering::Relaxed), 1);
        // Back to the unconfigured state: decode misses again.
        sink.on_video(&[0x41]);
        assert_eq!(video.decoded.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_dimension_published_to_observers() {
        let dimension = Arc::new(Observable::new());
        let video = Arc::new(StubState::default());
        let audio = Arc::new(StubState::default());
        let mut sink = DecoderSink::new(
            Box::new(StubDecoder::new(video)),
            Box::new(StubDecoder::new(audio)),
            dimension.clone(),
        );
        let rx = dimension.subscribe();

        sink.on_dimension(Dimension::new(720, 1280));
        assert_eq!(rx.try_recv().unwrap(), Dimension::new(720, 1280));
        assert_eq!(dimension.get(), Some(Dimension::new(720, 1280)));
    }
}
