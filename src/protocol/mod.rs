//! Protocol module - checksums, wire format, and frame types.
//!
//! This module implements the byte-level protocol spoken with the MCU:
//! - CRC-7 header checksum and CRC-16 payload checksum
//! - 6-byte command header and 5-byte response header encoding/decoding
//! - Frame structs with typed accessors

mod crc;
mod frame;
mod wire_format;

pub use crc::{crc16, crc7, CRC7_INIT, CRC7_TABLE};
pub use frame::{CommandFrame, ResponseFrame};
pub use wire_format::{
    decode_header, encode_bare_command, encode_command, encode_response, payload_checksum,
    validate_payload, Operation, ResponseHeader, ResponseStatus, COMMAND_HEADER_SIZE,
    EMPTY_PAYLOAD_CHECKSUM, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
