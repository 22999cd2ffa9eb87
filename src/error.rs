//! Error types for the mirroring pipeline
//!
//! Errors are contained at the session boundary: a fatal error ends the
//! current session, neither peer retries within a session.

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wire framing errors; fatal to the session
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Payload length {len} exceeds maximum {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Dimension payload must be 8 bytes, got {0}")]
    BadDimensionLength(usize),
}

/// Transport errors on either peer
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Bind failed: {0}")]
    BindFailed(String),

    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Connection closed by peer")]
    PeerClosed,

    #[error("Server is already running")]
    AlreadyRunning,

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Media façade errors
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Decoder not configured yet")]
    MissingConfig,

    #[error("Capture permission revoked: {0}")]
    PermissionLoss(String),
}

/// Discovery and endpoint errors
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Invalid endpoint '{0}': expected host:port")]
    InvalidEndpoint(String),

    #[error("Advertise failed: {0}")]
    AdvertiseFailed(String),

    #[error("Browse failed: {0}")]
    BrowseFailed(String),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
