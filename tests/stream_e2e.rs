//! End-to-end stream tests over localhost TCP
//!
//! Exercises the cold-join replay contract, session isolation across
//! reconnects, mid-session dimension changes and the full
//! producer-to-consumer pipeline.

use std::io::Read;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{unbounded, Sender};

use screen_reflect::config::AppConfig;
use screen_reflect::discovery::Endpoint;
use screen_reflect::error::MediaError;
use screen_reflect::media::{AudioDecoder, MediaEvent, SyntheticSource, VideoDecoder};
use screen_reflect::pipeline::{MirrorConsumer, MirrorProducer};
use screen_reflect::protocol::{Dimension, FrameHeader, PacketKind, HEADER_LEN};
use screen_reflect::transport::{ConnectionState, ServerState};

fn ephemeral_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.network.port = 0;
    config
}

fn read_frame(stream: &mut TcpStream) -> (u8, Vec<u8>) {
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header).unwrap();
    let parsed = FrameHeader::parse(&header);
    let mut payload = vec![0u8; parsed.len as usize];
    stream.read_exact(&mut payload).unwrap();
    (parsed.kind, payload)
}

fn connect(port: u16) -> TcpStream {
    let stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
}

fn prime_caches(producer: &MirrorProducer) {
    producer.submit(MediaEvent::VideoConfig(Bytes::from_static(&[
        0x67, 0x42, 0x00, 0x1E,
    ])));
    producer.submit(MediaEvent::AudioConfig(Bytes::from_static(&[0x11, 0x90])));
    producer.submit(MediaEvent::Video {
        payload: Bytes::from(vec![0x65; 768]),
        key: true,
    });
    producer.submit(MediaEvent::Dimension(Dimension::new(1280, 720)));
}

#[test]
fn cold_join_replays_session_caches_in_order() {
    let mut producer = MirrorProducer::new(&ephemeral_config());
    prime_caches(&producer);
    let port = producer.start().unwrap();

    let mut stream = connect(port);

    let (kind, payload) = read_frame(&mut stream);
    assert_eq!(kind, PacketKind::VideoConfig.as_wire());
    assert_eq!(payload, vec![0x67, 0x42, 0x00, 0x1E]);

    let (kind, payload) = read_frame(&mut stream);
    assert_eq!(kind, PacketKind::AudioConfig.as_wire());
    assert_eq!(payload, vec![0x11, 0x90]);

    let (kind, payload) = read_frame(&mut stream);
    assert_eq!(kind, PacketKind::Video.as_wire());
    assert_eq!(payload, vec![0x65; 768]);

    let (kind, payload) = read_frame(&mut stream);
    assert_eq!(kind, PacketKind::Dimension.as_wire());
    assert_eq!(payload, vec![0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x02, 0xD0]);

    // Live frames flow after the replay.
    producer.submit(MediaEvent::Audio(Bytes::from(vec![0xAF; 64])));
    let (kind, payload) = read_frame(&mut stream);
    assert_eq!(kind, PacketKind::Audio.as_wire());
    assert_eq!(payload.len(), 64);

    producer.stop();
}

#[test]
fn reconnect_replays_caches_and_never_leaks_old_frames() {
    let mut producer = MirrorProducer::new(&ephemeral_config());
    prime_caches(&producer);
    let port = producer.start().unwrap();

    // First session: consume the replay, then vanish.
    {
        let mut first = connect(port);
        for _ in 0..4 {
            read_frame(&mut first);
        }
    }

    // Feed frames until the producer notices the dead peer and returns to
    // listening; none of these may surface on the next session.
    let deadline = Instant::now() + Duration::from_secs(10);
    while producer.state() != ServerState::Listening {
        assert!(Instant::now() < deadline, "producer never noticed the disconnect");
        producer.submit(MediaEvent::Video {
            payload: Bytes::from(vec![0xB1; 32]),
            key: false,
        });
        thread::sleep(Duration::from_millis(10));
    }

    // Second session: replay only, then fresh frames.
    let mut second = connect(port);
    let (kind, _) = read_frame(&mut second);
    assert_eq!(kind, PacketKind::VideoConfig.as_wire());
    let (kind, _) = read_frame(&mut second);
    assert_eq!(kind, PacketKind::AudioConfig.as_wire());
    let (kind, payload) = read_frame(&mut second);
    assert_eq!(kind, PacketKind::Video.as_wire());
    assert_eq!(payload, vec![0x65; 768], "key frame cache survives reconnect");
    let (kind, _) = read_frame(&mut second);
    assert_eq!(kind, PacketKind::Dimension.as_wire());

    producer.submit(MediaEvent::Video {
        payload: Bytes::from(vec![0xB2; 16]),
        key: false,
    });
    let (kind, payload) = read_frame(&mut second);
    assert_eq!(kind, PacketKind::Video.as_wire());
    assert_eq!(
        payload,
        vec![0xB2; 16],
        "a frame enqueued before the new accept leaked into the session"
    );

    producer.stop();
}

#[test]
fn dimension_change_emits_update_before_following_key_frame() {
    let mut producer = MirrorProducer::new(&ephemeral_config());
    let port = producer.start().unwrap();
    let mut stream = connect(port);

    // Give the accept a moment so the session reset cannot race the
    // submissions below.
    thread::sleep(Duration::from_millis(200));

    producer.notify_dimension_change(Dimension::new(720, 1280));
    producer.submit(MediaEvent::Video {
        payload: Bytes::from(vec![0x65; 128]),
        key: true,
    });

    let (kind, payload) = read_frame(&mut stream);
    assert_eq!(kind, PacketKind::Dimension.as_wire());
    assert_eq!(payload, vec![0x00, 0x00, 0x02, 0xD0, 0x00, 0x00, 0x05, 0x00]);

    let (kind, payload) = read_frame(&mut stream);
    assert_eq!(kind, PacketKind::Video.as_wire());
    assert_eq!(payload[0], 0x65);

    producer.stop();
}

/// Decoder façade that reports dispatches back to the test thread
struct ReportingDecoder {
    configured: bool,
    events: Sender<(&'static str, Vec<u8>)>,
}

impl ReportingDecoder {
    fn new(events: Sender<(&'static str, Vec<u8>)>) -> Self {
        Self {
            configured: false,
            events,
        }
    }

    fn report(&self, what: &'static str, data: &[u8]) {
        let _ = self.events.send((what, data.to_vec()));
    }
}

impl VideoDecoder for ReportingDecoder {
    fn configure(&mut self, config: &[u8]) -> Result<(), MediaError> {
        self.configured = true;
        self.report("video_config", config);
        Ok(())
    }
    fn decode(&mut self, access_unit: &[u8]) -> Result<(), MediaError> {
        if !self.configured {
            return Err(MediaError::MissingConfig);
        }
        self.report("video", access_unit);
        Ok(())
    }
    fn reset(&mut self) {
        self.configured = false;
    }
}

impl AudioDecoder for ReportingDecoder {
    fn configure(&mut self, config: &[u8]) -> Result<(), MediaError> {
        self.configured = true;
        self.report("audio_config", config);
        Ok(())
    }
    fn decode(&mut self, frame: &[u8]) -> Result<(), MediaError> {
        if !self.configured {
            return Err(MediaError::MissingConfig);
        }
        self.report("audio", frame);
        Ok(())
    }
    fn reset(&mut self) {
        self.configured = false;
    }
}

#[test]
fn full_pipeline_synthetic_source_to_consumer() {
    let mut source = SyntheticSource::new(Dimension::new(1280, 720));
    let mut producer = MirrorProducer::new(&ephemeral_config());
    producer.set_encoder_handle(Arc::new(source.encoder_handle()));
    let port = producer.start().unwrap();

    let producer = Arc::new(producer);
    let feeder_producer = producer.clone();
    let feeder = thread::spawn(move || {
        for _ in 0..120 {
            for event in source.next_video() {
                feeder_producer.submit(event);
            }
            feeder_producer.submit(source.next_audio());
            thread::sleep(Duration::from_millis(5));
        }
    });

    let (events_tx, events_rx) = unbounded();
    let mut consumer = MirrorConsumer::new(&ephemeral_config());
    let dimensions = consumer.dimension_observable().subscribe();
    consumer
        .connect(
            Endpoint::new("127.0.0.1", port),
            Box::new(ReportingDecoder::new(events_tx.clone())),
            Box::new(ReportingDecoder::new(events_tx)),
        )
        .unwrap();

    // Configs arrive before any decodable frame; the first decoded video
    // frame is key-tagged (0x65 marker from the synthetic source).
    let mut saw_video_config = false;
    let mut first_video: Option<Vec<u8>> = None;
    let mut audio_frames = 0;
    let deadline = Instant::now() + Duration::from_secs(10);
    while (first_video.is_none() || audio_frames == 0) && Instant::now() < deadline {
        match events_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(("video_config", _)) => saw_video_config = true,
            Ok(("video", frame)) => {
                if first_video.is_none() {
                    assert!(saw_video_config, "video decoded before its config");
                    assert_eq!(frame[0], 0x65, "first decoded frame must be a key frame");
                    first_video = Some(frame);
                }
            }
            Ok(("audio", _)) => audio_frames += 1,
            Ok(_) => {}
            Err(e) => panic!("pipeline stalled: {e}"),
        }
    }
    assert!(first_video.is_some());
    assert!(audio_frames > 0);

    let dimension = dimensions
        .recv_timeout(Duration::from_secs(5))
        .expect("dimension observer never fired");
    assert_eq!(dimension, Dimension::new(1280, 720));

    assert_eq!(consumer.state(), ConnectionState::Receiving);
    consumer.disconnect();
    assert_eq!(consumer.state(), ConnectionState::Disconnected);
    assert!(consumer.stats().video > 0);

    feeder.join().unwrap();
}
