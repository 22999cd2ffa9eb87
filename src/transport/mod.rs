//! Session transport over one TCP connection
//!
//! The producer side listens, replays session caches on accept and
//! drains the multiplexer; the consumer side connects and feeds the
//! stream parser. Both ends contain errors at the session boundary.

pub mod client;
pub mod parser;
pub mod server;
pub mod socket;

pub use client::{ConnectionState, TransportClient};
pub use parser::{ParserStats, StreamParser};
pub use server::{ServerState, ServerStats, TransportServer};
