//! # PZEM Frame Codec
//!
//! Encoding of the fixed query frame and validation/decoding of the reply.
//!
//! The meter speaks Modbus RTU carried verbatim over a TCP stream. The query
//! never varies: device 1, function 0x04, ten registers from address 0, CRC
//! trailer included. The reply is conventionally 25 bytes:
//!
//! ```text
//! offset  0..3   header (device id, function code, byte count)
//! offset  3..5   voltage, u16, 0.1 V
//! offset  5..9   current, u32 register pair, 0.001 A
//! offset  9..13  power, u32 register pair, 0.1 W
//! offset 13..17  energy, u32 register pair, 0.001 kWh (cumulative)
//! offset 17..19  frequency, u16, 0.1 Hz
//! offset 19..21  power factor, u16, 0.01
//! offset 21..23  alert word, nonzero when the device signals an alert
//! offset 23..25  CRC16 trailer (wire order)
//! ```
//!
//! The 32-bit quantities are transmitted low register first; see
//! [`CodecConfig::register_swap`].

use serde::{Deserialize, Serialize};

use crate::crc::compute_crc;
use crate::error::{PzemError, PzemResult};

/// The fixed 8-byte query: device 1, function 4, 10 registers from address 0,
/// CRC embedded. The query never varies so the trailer is a protocol constant.
pub const QUERY_FRAME: [u8; 8] = [0x01, 0x04, 0x00, 0x00, 0x00, 0x0A, 0x70, 0x0D];

/// Minimum reply length: 3-byte header, 20 bytes of fields, 2-byte CRC.
pub const MIN_REPLY_LEN: usize = 25;

const VOLTAGE_OFFSET: usize = 3;
const CURRENT_OFFSET: usize = 5;
const POWER_OFFSET: usize = 9;
const ENERGY_OFFSET: usize = 13;
const FREQUENCY_OFFSET: usize = 17;
const POWER_FACTOR_OFFSET: usize = 19;
const ALERT_OFFSET: usize = 21;

/// One complete reading from the meter.
///
/// Produced only by a successful decode of a CRC-valid, plausible frame;
/// immutable after construction. `energy` is a cumulative counter and is
/// monotonically non-decreasing from the device's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    /// Volts, 0.1 resolution.
    pub voltage: f64,
    /// Amperes, 0.001 resolution.
    pub current: f64,
    /// Watts, 0.1 resolution.
    pub power: f64,
    /// Kilowatt-hours, 0.001 resolution, cumulative.
    pub energy: f64,
    /// Hertz, 0.1 resolution.
    pub frequency: f64,
    /// Ratio, 0.01 resolution (the device encodes it as ratio x 100).
    pub power_factor: f64,
    /// Diagnostic alert word was nonzero in the reply.
    pub alert: bool,
}

/// Frame codec configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodecConfig {
    /// Reassemble each 32-bit register pair with the group at the higher
    /// byte offset as the high word. This matches the PZEM firmware, which
    /// transmits the low register first; device variants that transmit
    /// high-first can disable it instead of needing a code change.
    pub register_swap: bool,

    /// Maximum allowed relative deviation of the decoded power from
    /// voltage times current before the frame is rejected as implausible.
    pub plausibility_tolerance: f64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            register_swap: true,
            plausibility_tolerance: 0.5,
        }
    }
}

/// Stateless encoder/decoder for PZEM frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec {
    config: CodecConfig,
}

impl FrameCodec {
    /// Create a codec with the given configuration.
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    /// The query frame to send. Constant; no CRC recomputation needed.
    pub fn encode_query(&self) -> &'static [u8] {
        &QUERY_FRAME
    }

    /// Validate the CRC trailer of `frame`.
    ///
    /// The trailing two bytes must equal the wire-order CRC16 of everything
    /// before them. On mismatch the frame must be discarded, not decoded.
    pub fn validate_crc(&self, frame: &[u8]) -> PzemResult<()> {
        if frame.len() < 4 {
            return Err(PzemError::short_frame(frame.len(), MIN_REPLY_LEN));
        }

        let (payload, trailer) = frame.split_at(frame.len() - 2);
        let expected = compute_crc(payload);
        let actual = u16::from_be_bytes([trailer[0], trailer[1]]);

        if expected != actual {
            return Err(PzemError::crc_mismatch(expected, actual));
        }

        Ok(())
    }

    /// Decode a reply frame into a [`MeterReading`].
    ///
    /// Length and CRC are checked before any field is touched, then the
    /// decoded values pass the plausibility gate: power must agree with
    /// voltage times current within the configured tolerance, and a zero
    /// power reading is rejected outright rather than dividing by zero.
    pub fn decode(&self, frame: &[u8]) -> PzemResult<MeterReading> {
        if frame.len() < MIN_REPLY_LEN {
            return Err(PzemError::short_frame(frame.len(), MIN_REPLY_LEN));
        }
        self.validate_crc(frame)?;

        let voltage = be_u16(frame, VOLTAGE_OFFSET) as f64 / 10.0;
        let current = self.register_pair(frame, CURRENT_OFFSET) as f64 / 1000.0;
        let power = self.register_pair(frame, POWER_OFFSET) as f64 / 10.0;
        let energy = self.register_pair(frame, ENERGY_OFFSET) as f64 / 1000.0;
        let frequency = be_u16(frame, FREQUENCY_OFFSET) as f64 / 10.0;
        let power_factor = be_u16(frame, POWER_FACTOR_OFFSET) as f64 / 100.0;
        let alert = be_u16(frame, ALERT_OFFSET) != 0;

        let expected_power = current * voltage;
        if power == 0.0 {
            return Err(PzemError::bad_value(power, expected_power));
        }
        let delta = (power - expected_power) / power;
        if delta.abs() > self.config.plausibility_tolerance {
            return Err(PzemError::bad_value(power, expected_power));
        }

        Ok(MeterReading {
            voltage,
            current,
            power,
            energy,
            frequency,
            power_factor,
            alert,
        })
    }

    /// Reassemble the two 16-bit register groups at `offset` and
    /// `offset + 2` into one 32-bit value.
    ///
    /// With `register_swap` enabled the group at the higher offset becomes
    /// the high word; disabled, the groups are taken in naive offset order.
    fn register_pair(&self, frame: &[u8], offset: usize) -> u32 {
        let first = be_u16(frame, offset) as u32;
        let second = be_u16(frame, offset + 2) as u32;
        if self.config.register_swap {
            (second << 16) | first
        } else {
            (first << 16) | second
        }
    }
}

fn be_u16(frame: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([frame[offset], frame[offset + 1]])
}
