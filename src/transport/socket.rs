//! TCP socket tuning
//!
//! Both peers disable Nagle and enable keepalive aggressive enough to
//! notice a dead LAN peer within seconds. The producer additionally sizes
//! its send buffer to absorb a single-frame burst at peak bitrate.

use std::net::TcpStream;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};

use crate::constants::{KEEPALIVE_IDLE_SECS, KEEPALIVE_INTERVAL_SECS, KEEPALIVE_RETRIES};

fn keepalive_params() -> TcpKeepalive {
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(KEEPALIVE_IDLE_SECS))
        .with_interval(Duration::from_secs(KEEPALIVE_INTERVAL_SECS));
    #[cfg(not(windows))]
    let keepalive = keepalive.with_retries(KEEPALIVE_RETRIES);
    keepalive
}

/// Producer-side stream: no Nagle, keepalive, large send buffer
pub fn tune_producer_stream(stream: &TcpStream, send_buffer_size: usize) -> std::io::Result<()> {
    stream.set_nodelay(true)?;
    let sock = SockRef::from(stream);
    sock.set_tcp_keepalive(&keepalive_params())?;
    sock.set_send_buffer_size(send_buffer_size)?;
    Ok(())
}

/// Consumer-side stream: no Nagle, keepalive
pub fn tune_consumer_stream(stream: &TcpStream) -> std::io::Result<()> {
    stream.set_nodelay(true)?;
    let sock = SockRef::from(stream);
    sock.set_tcp_keepalive(&keepalive_params())?;
    Ok(())
}
