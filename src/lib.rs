//! # Voltage PZEM - Peacefair Power Meter Client
//!
//! An async client for Peacefair PZEM electricity meters that speak Modbus
//! RTU carried verbatim over TCP. The meter answers a fixed function-code-4
//! query with a 25-byte binary frame carrying voltage, current, power,
//! cumulative energy, frequency and power factor, protected by the
//! Modbus-variant CRC16.
//!
//! ## Features
//!
//! - Fixed query / binary reply codec with CRC16 validation
//! - Device-specific register pair swap, exposed as a configuration flag
//! - Physical-plausibility gate (power must agree with voltage x current)
//! - Bounded retry/timeout poll loop over a single TCP connection
//! - Transport trait for testing the loop without hardware
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use voltage_pzem::poll;
//!
//! #[tokio::main]
//! async fn main() {
//!     match poll("192.168.1.89", 9000).await {
//!         Ok(r) => println!(
//!             "{:.1} V  {:.3} A  {:.1} W  {:.3} kWh  {:.1} Hz  PF {:.2}",
//!             r.voltage, r.current, r.power, r.energy, r.frequency, r.power_factor
//!         ),
//!         Err(e) => eprintln!("poll failed: {}", e),
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Poll Session  │  retry/timeout state machine
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Frame Codec   │  query constant, CRC check, field decode,
//! └─────────────────┘  plausibility gate
//!          │
//! ┌─────────────────┐
//! │   Transport     │  one TCP connection, per-attempt timeout
//! └─────────────────┘
//! ```
//!
//! The crate is stateless across polls; the only resource a poll owns is its
//! socket, and the CRC lookup table is compile-time constant and read-only.

/// Core error types and result handling
pub mod error;

/// Modbus-variant CRC16 engine
pub mod crc;

/// Query/reply frame codec and the decoded reading type
pub mod frame;

/// TCP transport with per-attempt timeout
pub mod transport;

/// Poll session with bounded retries
pub mod client;

// Re-export main types for convenience
pub use client::{poll, poll_with_config, PollConfig, PzemClient};
pub use crc::{compute_crc, crc_suffix};
pub use error::{PzemError, PzemResult};
pub use frame::{CodecConfig, FrameCodec, MeterReading, MIN_REPLY_LEN, QUERY_FRAME};
pub use transport::{MeterTransport, TcpTransport, TransportStats};

/// Default per-attempt read timeout (1 second).
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Default attempt budget per poll call: initial try + 5 retries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;

/// Conventional reply length from the reference device.
pub const REPLY_FRAME_SIZE: usize = 25;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
