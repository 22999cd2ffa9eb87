//! Producer and consumer wiring
//!
//! Assembles multiplexer, transport and façades into ready-to-run peers
//! and keeps the encoder feedback contract inside the core: the encoder
//! façade never learns about the transport.

pub mod consumer;
pub mod producer;

pub use consumer::MirrorConsumer;
pub use producer::MirrorProducer;
