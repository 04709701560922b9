//! Frame structs with typed accessors.
//!
//! [`CommandFrame`] is what the controller writes, [`ResponseFrame`] is what
//! it reads back. Both hold their payload as `bytes::Bytes`, so handing a
//! payload to the caller never copies.
//!
//! # Example
//!
//! ```
//! use mcu_link::protocol::{CommandFrame, Operation};
//!
//! let frame = CommandFrame::start(0x3B, &[0x01, 0x01]);
//! let bytes = frame.encode().unwrap();
//!
//! let parsed = CommandFrame::decode(&bytes).unwrap();
//! assert_eq!(parsed.operation, Operation::Start);
//! assert_eq!(parsed.command_id, 0x3B);
//! assert_eq!(parsed.payload(), &[0x01, 0x01]);
//! ```

use bytes::Bytes;

use super::crc::crc7;
use super::wire_format::{
    encode_command, encode_response, payload_checksum, Operation, ResponseHeader, ResponseStatus,
    COMMAND_HEADER_SIZE, HEADER_SIZE,
};
use crate::error::{McuLinkError, Result};

/// A command frame as sent to the MCU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    /// Requested operation.
    pub operation: Operation,
    /// Command identifier.
    pub command_id: u8,
    /// Command arguments.
    pub payload: Bytes,
}

impl CommandFrame {
    /// Create a new frame.
    pub fn new(operation: Operation, command_id: u8, payload: Bytes) -> Self {
        Self {
            operation,
            command_id,
            payload,
        }
    }

    /// Create a Start frame, copying the payload.
    pub fn start(command_id: u8, payload: &[u8]) -> Self {
        Self::new(
            Operation::Start,
            command_id,
            Bytes::copy_from_slice(payload),
        )
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_command(self.operation, self.command_id, &self.payload)
    }

    /// Decode a complete command frame.
    ///
    /// Checks the header CRC-7, the announced length and the payload
    /// checksum. Trailing bytes beyond the announced payload are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < COMMAND_HEADER_SIZE {
            return Err(McuLinkError::HeaderTooShort(buf.len()));
        }

        let expected = crc7(&buf[..5]);
        if expected != buf[5] {
            return Err(McuLinkError::HeaderChecksum {
                expected,
                received: buf[5],
            });
        }

        let operation = Operation::try_from(buf[0]).map_err(|op| {
            McuLinkError::InvalidResponse(format!("unknown operation {op}"))
        })?;

        let length = buf[2] as usize;
        let available = buf.len() - COMMAND_HEADER_SIZE;
        if available < length {
            return Err(McuLinkError::PayloadTruncated {
                expected: length,
                received: available,
            });
        }

        let payload = &buf[COMMAND_HEADER_SIZE..COMMAND_HEADER_SIZE + length];
        if payload_checksum(payload) != u16::from_le_bytes([buf[3], buf[4]]) {
            return Err(McuLinkError::PayloadChecksum);
        }

        Ok(Self::new(operation, buf[1], Bytes::copy_from_slice(payload)))
    }
}

/// A complete response frame as received from the MCU.
#[derive(Debug, Clone)]
pub struct ResponseFrame {
    /// Decoded header.
    pub header: ResponseHeader,
    /// Payload bytes.
    pub payload: Bytes,
}

impl ResponseFrame {
    /// Get the response status.
    #[inline]
    pub fn status(&self) -> ResponseStatus {
        self.header.status
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Decode a header followed by its payload.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let header = ResponseHeader::decode(buf)?;
        let length = header.payload_length as usize;
        let available = buf.len() - HEADER_SIZE;
        if available < length {
            return Err(McuLinkError::PayloadTruncated {
                expected: length,
                received: available,
            });
        }

        let payload = &buf[HEADER_SIZE..HEADER_SIZE + length];
        if length > 0 && !header.validate_payload(payload) {
            return Err(McuLinkError::PayloadChecksum);
        }

        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(payload),
        })
    }

    /// Encode a response frame from its parts.
    pub fn encode(status: ResponseStatus, payload: &[u8]) -> Result<Vec<u8>> {
        encode_response(status, payload)
    }
}
