//! # Error Handling
//!
//! Error types for PZEM meter communication, covering transport failures
//! (connect, send, receive, timeout), frame-level failures (short frames,
//! CRC mismatch), decoded-but-implausible readings, and retry-budget
//! exhaustion.
//!
//! ## Error Recovery
//!
//! Per-attempt failures (timeout, CRC mismatch, short frame, bad value) are
//! transient and handled inside the poll loop; only the aggregate outcome
//! crosses the crate boundary. `is_recoverable` reports whether a failed
//! operation might succeed if retried:
//!
//! ```rust
//! use voltage_pzem::PzemError;
//!
//! let err = PzemError::timeout("read reply", 1000);
//! assert!(err.is_recoverable());
//!
//! let err = PzemError::poll_exhausted(6);
//! assert!(!err.is_recoverable());
//! ```

use thiserror::Error;

/// Result type alias for PZEM operations.
pub type PzemResult<T> = Result<T, PzemError>;

/// Errors produced while polling a PZEM meter.
///
/// Each variant carries enough context to log a useful diagnostic. The
/// classification helpers (`is_recoverable`, `is_transport_error`,
/// `is_protocol_error`) drive the retry decisions in the poll loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PzemError {
    /// I/O failure on the socket (send or receive).
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Connection could not be opened, or died mid-exchange.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// No reply within the per-attempt window.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Reply frame shorter than the minimum decodable length.
    #[error("Short frame: {length} bytes, need at least {minimum}")]
    ShortFrame { length: usize, minimum: usize },

    /// Reply frame failed checksum validation.
    #[error("CRC validation failed: expected={expected:04X}, actual={actual:04X}")]
    CrcMismatch { expected: u16, actual: u16 },

    /// Frame decoded cleanly but the values are physically inconsistent
    /// (power does not agree with voltage times current).
    #[error("Implausible reading: power={power}W, voltage*current={expected}W")]
    BadValue { power: f64, expected: f64 },

    /// Every attempt within one poll call failed.
    #[error("Poll exhausted after {attempts} attempts")]
    PollExhausted { attempts: u32 },
}

impl PzemError {
    /// Create a new I/O error.
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }

    /// Create a new connection error.
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection { message: message.into() }
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a short-frame error.
    pub fn short_frame(length: usize, minimum: usize) -> Self {
        Self::ShortFrame { length, minimum }
    }

    /// Create a CRC mismatch error.
    pub fn crc_mismatch(expected: u16, actual: u16) -> Self {
        Self::CrcMismatch { expected, actual }
    }

    /// Create a bad-value error from the decoded power and the power implied
    /// by the decoded voltage and current.
    pub fn bad_value(power: f64, expected: f64) -> Self {
        Self::BadValue { power, expected }
    }

    /// Create a poll-exhausted error.
    pub fn poll_exhausted(attempts: u32) -> Self {
        Self::PollExhausted { attempts }
    }

    /// Check if the error is recoverable (a later attempt may succeed).
    ///
    /// Transient conditions return `true`; terminal outcomes of a whole poll
    /// call (`PollExhausted`) return `false`. A `Connection` failure is
    /// recoverable across poll calls, not within one.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { .. } => true,
            Self::Connection { .. } => true,
            Self::Timeout { .. } => true,
            Self::ShortFrame { .. } => true,
            Self::CrcMismatch { .. } => true,
            Self::BadValue { .. } => true,
            Self::PollExhausted { .. } => false,
        }
    }

    /// Check if the error is a network/transport issue.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Connection { .. } | Self::Timeout { .. }
        )
    }

    /// Check if the error is a frame/protocol issue.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::ShortFrame { .. } | Self::CrcMismatch { .. } | Self::BadValue { .. }
        )
    }
}

/// Convert from std::io::Error, preserving the original message.
impl From<std::io::Error> for PzemError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

/// Convert from tokio timeout errors.
///
/// The specific operation and timeout should be provided when creating
/// timeout errors manually; this conversion is a generic fallback.
impl From<tokio::time::error::Elapsed> for PzemError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::timeout("operation timeout", 0)
    }
}
