//! # Meter Transport Layer
//!
//! One TCP connection to one meter endpoint, with a fixed per-attempt read
//! timeout and optional packet logging.
//!
//! The [`MeterTransport`] trait abstracts the socket so the poll loop can be
//! exercised against mock transports in tests; [`TcpTransport`] is the real
//! implementation. A transport is exclusively owned by the in-flight poll
//! call for its duration, and the CRC table is the only state shared across
//! concurrent polls.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use voltage_pzem::transport::{MeterTransport, TcpTransport};
//! use voltage_pzem::frame::QUERY_FRAME;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut transport =
//!         TcpTransport::new("192.168.1.89:9000".parse()?, Duration::from_secs(1)).await?;
//!
//!     transport.send_query(&QUERY_FRAME).await?;
//!     let reply = transport.recv_reply().await?;
//!     println!("reply: {} bytes", reply.len());
//!
//!     transport.close().await?;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{PzemError, PzemResult};

/// Largest reply we will accept. The device conventionally sends 25 bytes;
/// anything beyond an RTU frame is garbage.
pub const MAX_REPLY_FRAME_SIZE: usize = 256;

/// Log a packet in hex with its direction.
fn log_packet(direction: &str, data: &[u8]) {
    debug!("[PZEM] {} {}", direction, hex::encode_upper(data));
}

/// Transport abstraction for one meter endpoint.
///
/// Implementations must be `Send` so a poll can run on any task. The
/// per-attempt read timeout is applied inside `recv_reply`, which reports it
/// as [`PzemError::Timeout`].
#[async_trait]
pub trait MeterTransport: Send {
    /// Send the query frame.
    async fn send_query(&mut self, frame: &[u8]) -> PzemResult<()>;

    /// Wait for one reply, bounded by the configured read timeout.
    async fn recv_reply(&mut self) -> PzemResult<Vec<u8>>;

    /// Check if the transport believes it has an open connection.
    fn is_connected(&self) -> bool;

    /// Close the connection and release the socket.
    ///
    /// Must be safe to call on an already-closed transport.
    async fn close(&mut self) -> PzemResult<()>;

    /// Get communication statistics.
    fn get_stats(&self) -> TransportStats;
}

/// Transport layer statistics.
#[derive(Debug, Clone, Default)]
pub struct TransportStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// TCP transport to a PZEM meter.
///
/// The meter carries raw Modbus RTU frames over the stream, so there is no
/// framing header: one query is written, one reply is read.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    pub address: SocketAddr,
    read_timeout: Duration,
    stats: TransportStats,
    /// Enable packet logging for debugging.
    packet_logging: bool,
}

impl TcpTransport {
    /// Connect to the meter at `address`.
    pub async fn new(address: SocketAddr, read_timeout: Duration) -> PzemResult<Self> {
        let stream = TcpStream::connect(address).await.map_err(|e| {
            PzemError::connection(format!("Failed to connect to {}: {}", address, e))
        })?;

        Ok(Self {
            stream: Some(stream),
            address,
            read_timeout,
            stats: TransportStats::default(),
            packet_logging: false,
        })
    }

    /// Connect with packet logging enabled.
    pub async fn with_packet_logging(
        address: SocketAddr,
        read_timeout: Duration,
        enable_logging: bool,
    ) -> PzemResult<Self> {
        let mut transport = Self::new(address, read_timeout).await?;
        transport.packet_logging = enable_logging;
        Ok(transport)
    }

    /// Enable or disable packet logging.
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.packet_logging = enabled;
    }

    fn stream_mut(&mut self) -> PzemResult<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| PzemError::connection("Transport is closed"))
    }
}

#[async_trait]
impl MeterTransport for TcpTransport {
    async fn send_query(&mut self, frame: &[u8]) -> PzemResult<()> {
        if self.packet_logging {
            log_packet("send", frame);
        }

        let timeout_ms = self.read_timeout.as_millis() as u64;
        let read_timeout = self.read_timeout;
        let stream = self.stream_mut()?;
        match timeout(read_timeout, stream.write_all(frame)).await {
            Ok(Ok(())) => {
                self.stats.requests_sent += 1;
                self.stats.bytes_sent += frame.len() as u64;
                Ok(())
            }
            Ok(Err(e)) => {
                self.stats.errors += 1;
                self.stream = None;
                Err(PzemError::io(format!("Failed to send query: {}", e)))
            }
            Err(_) => {
                self.stats.timeouts += 1;
                self.stats.errors += 1;
                self.stream = None;
                Err(PzemError::timeout("send query", timeout_ms))
            }
        }
    }

    async fn recv_reply(&mut self) -> PzemResult<Vec<u8>> {
        let timeout_ms = self.read_timeout.as_millis() as u64;
        let read_timeout = self.read_timeout;
        let stream = self.stream_mut()?;

        let mut buf = [0u8; MAX_REPLY_FRAME_SIZE];
        let n = match timeout(read_timeout, stream.read(&mut buf)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                self.stats.errors += 1;
                self.stream = None;
                return Err(PzemError::io(format!("Failed to read reply: {}", e)));
            }
            Err(_) => {
                self.stats.timeouts += 1;
                return Err(PzemError::timeout("read reply", timeout_ms));
            }
        };

        if n == 0 {
            self.stats.errors += 1;
            self.stream = None;
            return Err(PzemError::connection("Meter closed the connection"));
        }

        self.stats.responses_received += 1;
        self.stats.bytes_received += n as u64;

        let reply = buf[..n].to_vec();
        if self.packet_logging {
            log_packet("recv", &reply);
        }

        Ok(reply)
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn close(&mut self) -> PzemResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        Ok(())
    }

    fn get_stats(&self) -> TransportStats {
        self.stats.clone()
    }
}
