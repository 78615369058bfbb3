//! # CRC16 Engine
//!
//! Modbus-variant CRC16 used by the PZEM reply frames: polynomial mask
//! `0xA001`, initial value `0xFFFF`, table-driven, with the final result
//! byte-swapped because the wire stores the checksum low-byte-first
//! relative to the raw computation.
//!
//! The lookup table is built at compile time and shared read-only; there is
//! no runtime initialization and nothing to synchronize.

/// Reversed-polynomial mask for CRC-16/MODBUS.
const POLY: u16 = 0xA001;

/// Build the standard 256-entry reflected CRC16 table.
const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut byte = i as u16;
        let mut crc = 0u16;
        let mut bit = 0;
        while bit < 8 {
            if (byte ^ crc) & 0x0001 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
            byte >>= 1;
            bit += 1;
        }
        table[i as usize] = crc;
        i += 1;
    }
    table
}

static CRC_TABLE: [u16; 256] = build_table();

/// Compute the wire-order CRC16 of `data`.
///
/// The running checksum starts at `0xFFFF` and is reduced through the lookup
/// table one byte at a time. The 16-bit result is byte-swapped before being
/// returned, so the high byte of the returned value is the first CRC byte on
/// the wire and the low byte is the second.
pub fn compute_crc(data: &[u8]) -> u16 {
    let mut crc = 0xFFFFu16;
    for &byte in data {
        let idx = ((crc ^ byte as u16) & 0x00FF) as usize;
        crc = (crc >> 8) ^ CRC_TABLE[idx];
    }
    crc.swap_bytes()
}

/// The two trailing checksum bytes a frame over `data` must carry,
/// in wire order.
pub fn crc_suffix(data: &[u8]) -> [u8; 2] {
    compute_crc(data).to_be_bytes()
}
