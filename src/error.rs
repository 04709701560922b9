//! Error types for mcu-link.

use bytes::Bytes;
use thiserror::Error;

use crate::protocol::ResponseStatus;

/// Main error type for all link operations.
#[derive(Debug, Error)]
pub enum McuLinkError {
    /// I/O error reported by the byte channel or the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (storage metadata, firmware catalog, configuration).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Command payload does not fit into a single frame.
    #[error("Payload is too long ({0} bytes, 255 allowed)")]
    PayloadTooLong(usize),

    /// Fewer bytes than a response header were read.
    #[error("Header too short ({0} bytes)")]
    HeaderTooShort(usize),

    /// Header CRC-7 did not match the received header bytes.
    #[error("Header checksum mismatch (expected {expected:#04x}, received {received:#04x})")]
    HeaderChecksum { expected: u8, received: u8 },

    /// Response header carried a status byte outside the known range.
    #[error("Unknown response status {0}")]
    UnknownStatus(u8),

    /// Payload read started with a header different from the accepted one.
    #[error("Read payload: unexpected header received")]
    HeaderMismatch,

    /// Payload read was shorter than the header announced.
    #[error("Read payload: expected {expected} bytes, received {received}")]
    PayloadTruncated { expected: usize, received: usize },

    /// Payload CRC-16 did not match the header.
    #[error("Read payload: payload contents invalid")]
    PayloadChecksum,

    /// Local retries were exhausted without a valid read.
    #[error("Broken channel: {0}")]
    BrokenChannel(String),

    /// The responder kept reporting a command integrity error.
    #[error("Command {command_id:#04x} rejected with integrity error {attempts} times")]
    IntegrityRetriesExhausted { command_id: u8, attempts: u32 },

    /// The responder does not implement the command.
    #[error("Command not implemented: {0:#04x}")]
    UnknownCommand(u8),

    /// The responder executed the command and reported an error status.
    #[error("Command {command_id:#04x} status: {status:?} with payload: {payload:?}")]
    CommandFailed {
        command_id: u8,
        status: ResponseStatus,
        payload: Bytes,
    },

    /// A successful response carried a payload that could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Long-message protocol precondition violated.
    #[error("Long message error: {0}")]
    LongMessage(String),

    /// Storage has no element with the given name.
    #[error("Storage element not found: {0}")]
    StorageNotFound(String),

    /// Stored data failed length, checksum, or metadata validation.
    #[error("Storage integrity error: {0}")]
    StorageIntegrity(String),

    /// Storage backend could not be used.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Version string could not be parsed.
    #[error("Invalid version format: {0}")]
    VersionFormat(String),

    /// Firmware catalog is missing, unreadable, or has no matching entry.
    #[error("Firmware catalog error: {0}")]
    FirmwareCatalog(String),

    /// Local firmware image does not match its catalog entry.
    #[error("Firmware integrity error: {0}")]
    FirmwareIntegrity(String),

    /// Neither control interface answered within the detection window.
    #[error("Could not determine operation mode")]
    OperationModeTimeout,

    /// The MCU reported a different operation mode than required.
    #[error("Unexpected operation mode: {0:?}")]
    UnexpectedMode(crate::command::OperationMode),
}

impl McuLinkError {
    /// True for errors that mean the link itself went away.
    ///
    /// This is what a rebooting MCU looks like from the controller side.
    pub fn is_link_loss(&self) -> bool {
        matches!(self, McuLinkError::Io(_) | McuLinkError::BrokenChannel(_))
    }
}

/// Result type alias using McuLinkError.
pub type Result<T> = std::result::Result<T, McuLinkError>;
