//! # Poll Session
//!
//! Drives one polling attempt end-to-end against one meter: send the fixed
//! query, wait for a reply, validate and decode it, and retry transient
//! failures up to a fixed budget. Only the aggregate outcome (a reading or
//! a terminal error) crosses the crate boundary.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use voltage_pzem::poll;
//!
//! #[tokio::main]
//! async fn main() {
//!     match poll("192.168.1.89", 9000).await {
//!         Ok(reading) => println!("{:.1} V, {:.1} W", reading.voltage, reading.power),
//!         Err(e) => eprintln!("meter unavailable: {}", e),
//!     }
//! }
//! ```
//!
//! Callers are expected to invoke `poll` on their own schedule (the typical
//! host polls every few seconds per device) and to treat any error as "data
//! temporarily unavailable" rather than fatal. Each invocation owns its own
//! socket; concurrent polls of different devices need no coordination.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{PzemError, PzemResult};
use crate::frame::{CodecConfig, FrameCodec, MeterReading};
use crate::transport::{MeterTransport, TcpTransport, TransportStats};

/// Poll loop configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollConfig {
    /// Per-attempt read timeout. A tunable, not a protocol constant.
    pub read_timeout: Duration,

    /// Total attempt budget per poll call: initial try plus retries.
    pub max_attempts: u32,

    /// Retry an implausible reading like a CRC mismatch instead of
    /// surfacing it immediately. A corrupted-but-CRC-valid frame is as
    /// transient as a corrupted-and-CRC-invalid one, so this defaults on.
    pub retry_bad_value: bool,

    /// Frame codec configuration.
    pub codec: CodecConfig,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(crate::DEFAULT_TIMEOUT_MS),
            max_attempts: crate::DEFAULT_MAX_ATTEMPTS,
            retry_bad_value: true,
            codec: CodecConfig::default(),
        }
    }
}

/// Per-attempt outcome inside the retry loop.
///
/// The loop is a plain state machine over these cases; no error escapes an
/// individual attempt.
enum Attempt {
    Success(MeterReading),
    Retry(PzemError),
    Abort(PzemError),
}

/// Client for one PZEM meter over any [`MeterTransport`].
pub struct PzemClient<T: MeterTransport> {
    transport: T,
    codec: FrameCodec,
    config: PollConfig,
}

impl PzemClient<TcpTransport> {
    /// Connect to `address` and build a client with the given configuration.
    pub async fn connect(address: SocketAddr, config: PollConfig) -> PzemResult<Self> {
        let transport = TcpTransport::new(address, config.read_timeout).await?;
        Ok(Self::new(transport, config))
    }
}

impl<T: MeterTransport> PzemClient<T> {
    /// Build a client over an already-connected transport.
    pub fn new(transport: T, config: PollConfig) -> Self {
        Self {
            transport,
            codec: FrameCodec::new(config.codec),
            config,
        }
    }

    /// Get a reference to the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get transport statistics.
    pub fn get_stats(&self) -> TransportStats {
        self.transport.get_stats()
    }

    /// Poll the meter once, consuming the client and its connection.
    ///
    /// Runs up to `max_attempts` query/reply exchanges on the one
    /// connection. Timeouts, CRC mismatches and short frames are retried;
    /// implausible readings are retried or surfaced per `retry_bad_value`;
    /// transport failures abort immediately. If the budget runs out the
    /// result is [`PzemError::PollExhausted`], never an empty reading.
    ///
    /// The connection is closed on every exit path.
    pub async fn poll_once(mut self) -> PzemResult<MeterReading> {
        let result = self.run_attempts().await;
        let _ = self.transport.close().await;
        result
    }

    async fn run_attempts(&mut self) -> PzemResult<MeterReading> {
        for attempt in 1..=self.config.max_attempts {
            match self.attempt().await {
                Attempt::Success(reading) => {
                    debug!("attempt {}: decoded reading {:?}", attempt, reading);
                    return Ok(reading);
                }
                Attempt::Retry(err) => {
                    debug!("attempt {}/{} failed: {}", attempt, self.config.max_attempts, err);
                }
                Attempt::Abort(err) => {
                    warn!("attempt {}: aborting poll: {}", attempt, err);
                    return Err(err);
                }
            }
        }

        Err(PzemError::poll_exhausted(self.config.max_attempts))
    }

    /// One query/reply exchange, classified for the retry loop.
    async fn attempt(&mut self) -> Attempt {
        if let Err(err) = self.transport.send_query(self.codec.encode_query()).await {
            return Attempt::Abort(err);
        }

        let reply = match self.transport.recv_reply().await {
            Ok(reply) => reply,
            Err(err @ PzemError::Timeout { .. }) => return Attempt::Retry(err),
            Err(err) => return Attempt::Abort(err),
        };

        match self.codec.decode(&reply) {
            Ok(reading) => Attempt::Success(reading),
            Err(err @ (PzemError::CrcMismatch { .. } | PzemError::ShortFrame { .. })) => {
                Attempt::Retry(err)
            }
            Err(err @ PzemError::BadValue { .. }) => {
                if self.config.retry_bad_value {
                    Attempt::Retry(err)
                } else {
                    Attempt::Abort(err)
                }
            }
            Err(err) => Attempt::Abort(err),
        }
    }
}

/// Poll the meter at `host:port` once with default configuration.
///
/// Opens a TCP connection, runs the bounded retry loop, and closes the
/// connection before returning.
pub async fn poll(host: &str, port: u16) -> PzemResult<MeterReading> {
    poll_with_config(host, port, PollConfig::default()).await
}

/// Poll the meter at `host:port` once with the given configuration.
pub async fn poll_with_config(
    host: &str,
    port: u16,
    config: PollConfig,
) -> PzemResult<MeterReading> {
    let address: SocketAddr = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| PzemError::connection(format!("Failed to resolve {}:{}: {}", host, port, e)))?
        .next()
        .ok_or_else(|| PzemError::connection(format!("No address for {}:{}", host, port)))?;

    let client = PzemClient::connect(address, config).await?;
    client.poll_once().await
}
