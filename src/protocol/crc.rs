//! Header and payload checksums.
//!
//! - CRC-7 (polynomial 0x09, table driven, initial value 0xFF) protects the
//!   command and response headers.
//! - CRC-16/CCITT (polynomial 0x1021, initial value 0xFFFF) protects payloads.
//!
//! # Example
//!
//! ```
//! use mcu_link::protocol::{crc16, crc7};
//!
//! assert_eq!(crc7(b"foobar"), 0x10);
//! assert_eq!(crc16(b"123456789"), 0x29B1);
//! ```

use crc::{Crc, CRC_16_IBM_3740};

/// Initial CRC-7 register value.
pub const CRC7_INIT: u8 = 0xFF;

const CRC7_POLY: u8 = 0x09;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Precomputed CRC-7 lookup table.
pub static CRC7_TABLE: [u8; 256] = build_crc7_table();

const fn build_crc7_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ (CRC7_POLY << 1)
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc >> 1;
        i += 1;
    }
    table
}

/// Compute the 7-bit header checksum of `data`.
#[inline]
pub fn crc7(data: &[u8]) -> u8 {
    data.iter()
        .fold(CRC7_INIT, |crc, &b| CRC7_TABLE[(b ^ (crc << 1)) as usize])
}

/// Compute the 16-bit payload checksum of `data`.
#[inline]
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc7_table_spot_values() {
        assert_eq!(CRC7_TABLE[0x00], 0x00);
        assert_eq!(CRC7_TABLE[0x01], 0x09);
        assert_eq!(CRC7_TABLE[0x08], 0x48);
        assert_eq!(CRC7_TABLE[0x10], 0x19);
        assert_eq!(CRC7_TABLE[0x80], 0x41);
        assert_eq!(CRC7_TABLE[0xFF], 0x79);
    }

    #[test]
    fn test_crc7_table_is_seven_bit() {
        assert!(CRC7_TABLE.iter().all(|&v| v < 0x80));
    }

    #[test]
    fn test_crc7_golden_vectors() {
        assert_eq!(crc7(b"foobar"), 0x10);
        assert_eq!(crc7(b"123456789"), 0x50);
        // Start header for command 0x02 with no payload
        assert_eq!(crc7(&[0x00, 0x02, 0x00, 0xFF, 0xFF]), 0x51);
        // GetResult header for command 0x02
        assert_eq!(crc7(&[0x02, 0x02, 0x00, 0xFF, 0xFF]), 0x3D);
    }

    #[test]
    fn test_crc7_empty_input_is_initial_value() {
        assert_eq!(crc7(&[]), CRC7_INIT);
    }

    #[test]
    fn test_crc16_golden_vectors() {
        assert_eq!(crc16(b"123456789"), 0x29B1);
        assert_eq!(crc16(b"foobar"), 0xBE35);
        assert_eq!(crc16(b"hello"), 0xD26E);
        assert_eq!(crc16(&[0xAA]), 0xF550);
    }
}
