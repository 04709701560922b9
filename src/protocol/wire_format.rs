//! Wire format encoding and decoding.
//!
//! Command frame (controller → MCU):
//! ```text
//! ┌────┬─────┬─────┬──────────┬──────────┬──────┬─────────────┐
//! │ Op │ Cmd │ Len │ CRC16 lo │ CRC16 hi │ CRC7 │ Payload ... │
//! └────┴─────┴─────┴──────────┴──────────┴──────┴─────────────┘
//! ```
//!
//! Response (MCU → controller):
//! ```text
//! ┌────────┬─────┬──────────┬──────────┬──────┬─────────────┐
//! │ Status │ Len │ CRC16 lo │ CRC16 hi │ CRC7 │ Payload ... │
//! └────────┴─────┴──────────┴──────────┴──────┴─────────────┘
//! ```
//!
//! CRC7 covers the header bytes before it. An empty payload is marked with
//! the literal checksum bytes `0xFF 0xFF`.

use super::crc::{crc16, crc7};
use crate::error::{McuLinkError, Result};

/// Response header size in bytes (fixed, exactly 5).
pub const HEADER_SIZE: usize = 5;

/// Command header size in bytes (fixed, exactly 6).
pub const COMMAND_HEADER_SIZE: usize = 6;

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD_SIZE: usize = 255;

/// Checksum sentinel sent in place of a CRC when the payload is empty.
pub const EMPTY_PAYLOAD_CHECKSUM: u16 = 0xFFFF;

/// Operation requested by a command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operation {
    /// Start executing the command.
    Start = 0,
    /// Restart the command.
    Restart = 1,
    /// Poll the result of a pending command.
    GetResult = 2,
    /// Cancel a pending command.
    Cancel = 3,
}

impl TryFrom<u8> for Operation {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Operation::Start),
            1 => Ok(Operation::Restart),
            2 => Ok(Operation::GetResult),
            3 => Ok(Operation::Cancel),
            other => Err(other),
        }
    }
}

/// Status reported in a response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseStatus {
    Ok = 0,
    /// Command not accepted yet; resend the Start frame.
    Busy = 1,
    /// Command accepted but not finished; poll with GetResult.
    Pending = 2,

    UnknownOperation = 3,
    InvalidOperation = 4,
    /// The responder did not receive the command intact.
    CommandIntegrityError = 5,
    PayloadIntegrityError = 6,
    PayloadLengthError = 7,
    UnknownCommand = 8,
    CommandError = 9,
    InternalError = 10,

    /// Never sent by the MCU; produced locally when the responder stays busy.
    Timeout = 11,
}

impl ResponseStatus {
    /// Check if this status reports a failure.
    #[inline]
    pub fn is_error(self) -> bool {
        !matches!(
            self,
            ResponseStatus::Ok | ResponseStatus::Busy | ResponseStatus::Pending
        )
    }
}

impl TryFrom<u8> for ResponseStatus {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(ResponseStatus::Ok),
            1 => Ok(ResponseStatus::Busy),
            2 => Ok(ResponseStatus::Pending),
            3 => Ok(ResponseStatus::UnknownOperation),
            4 => Ok(ResponseStatus::InvalidOperation),
            5 => Ok(ResponseStatus::CommandIntegrityError),
            6 => Ok(ResponseStatus::PayloadIntegrityError),
            7 => Ok(ResponseStatus::PayloadLengthError),
            8 => Ok(ResponseStatus::UnknownCommand),
            9 => Ok(ResponseStatus::CommandError),
            10 => Ok(ResponseStatus::InternalError),
            11 => Ok(ResponseStatus::Timeout),
            other => Err(other),
        }
    }
}

/// Payload checksum as it appears on the wire.
#[inline]
pub fn payload_checksum(payload: &[u8]) -> u16 {
    if payload.is_empty() {
        EMPTY_PAYLOAD_CHECKSUM
    } else {
        crc16(payload)
    }
}

/// Encode a command frame.
///
/// # Errors
///
/// Returns `PayloadTooLong` if the payload exceeds 255 bytes.
///
/// # Example
///
/// ```
/// use mcu_link::protocol::{encode_command, Operation};
///
/// let frame = encode_command(Operation::Start, 0x02, b"").unwrap();
/// assert_eq!(frame, [0x00, 0x02, 0x00, 0xFF, 0xFF, 0x51]);
/// ```
pub fn encode_command(operation: Operation, command_id: u8, payload: &[u8]) -> Result<Vec<u8>> {
    let length =
        u8::try_from(payload.len()).map_err(|_| McuLinkError::PayloadTooLong(payload.len()))?;

    let mut buf = Vec::with_capacity(COMMAND_HEADER_SIZE + payload.len());
    let [lo, hi] = payload_checksum(payload).to_le_bytes();
    buf.extend_from_slice(&[operation as u8, command_id, length, lo, hi]);
    buf.push(crc7(&buf));
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Encode a command frame without payload.
///
/// Cannot fail, which makes it suitable for the GetResult and Cancel frames.
pub fn encode_bare_command(operation: Operation, command_id: u8) -> [u8; COMMAND_HEADER_SIZE] {
    let [lo, hi] = EMPTY_PAYLOAD_CHECKSUM.to_le_bytes();
    let mut buf = [operation as u8, command_id, 0, lo, hi, 0];
    buf[5] = crc7(&buf[..5]);
    buf
}

/// Decoded response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Status reported by the responder.
    pub status: ResponseStatus,
    /// Length of the payload following the header.
    pub payload_length: u8,
    /// CRC-16 of the payload (`0xFFFF` when empty).
    pub payload_checksum: u16,
    /// Header bytes covered by the header checksum.
    pub raw: [u8; HEADER_SIZE - 1],
}

impl ResponseHeader {
    /// Decode and validate a response header.
    ///
    /// Only the first 5 bytes are inspected.
    ///
    /// # Errors
    ///
    /// - `HeaderTooShort` if fewer than 5 bytes are supplied
    /// - `HeaderChecksum` if the CRC-7 does not match
    /// - `UnknownStatus` if the status byte is out of range
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(McuLinkError::HeaderTooShort(buf.len()));
        }

        let raw = [buf[0], buf[1], buf[2], buf[3]];
        let expected = crc7(&raw);
        if expected != buf[4] {
            return Err(McuLinkError::HeaderChecksum {
                expected,
                received: buf[4],
            });
        }

        let status = ResponseStatus::try_from(raw[0]).map_err(McuLinkError::UnknownStatus)?;

        Ok(Self {
            status,
            payload_length: raw[1],
            payload_checksum: u16::from_le_bytes([raw[2], raw[3]]),
            raw,
        })
    }

    /// Check the payload against the checksum announced in the header.
    #[inline]
    pub fn validate_payload(&self, payload: &[u8]) -> bool {
        self.payload_checksum == crc16(payload)
    }

    /// Check that `header_bytes` starts with the same bytes as this header.
    #[inline]
    pub fn is_same_as(&self, header_bytes: &[u8]) -> bool {
        header_bytes.len() >= self.raw.len() && header_bytes[..self.raw.len()] == self.raw
    }
}

/// Encode a response as the MCU sends it.
///
/// Used by responder-side code and channel simulators.
///
/// # Errors
///
/// Returns `PayloadTooLong` if the payload exceeds 255 bytes.
pub fn encode_response(status: ResponseStatus, payload: &[u8]) -> Result<Vec<u8>> {
    let length =
        u8::try_from(payload.len()).map_err(|_| McuLinkError::PayloadTooLong(payload.len()))?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    let [lo, hi] = payload_checksum(payload).to_le_bytes();
    buf.extend_from_slice(&[status as u8, length, lo, hi]);
    buf.push(crc7(&buf));
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Decode a response header (standalone function).
#[inline]
pub fn decode_header(buf: &[u8]) -> Result<ResponseHeader> {
    ResponseHeader::decode(buf)
}

/// Validate a payload against its header (standalone function).
#[inline]
pub fn validate_payload(header: &ResponseHeader, payload: &[u8]) -> bool {
    header.validate_payload(payload)
}
