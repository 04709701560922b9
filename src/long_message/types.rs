//! Long-message type, status, and state enums.

use std::fmt;

use crate::error::{McuLinkError, Result};

/// Size of an MD5 digest.
pub const MD5_SIZE: usize = 16;

/// Kind of data carried by a long message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LongMessageType {
    Firmware = 1,
    Framework = 2,
    Configuration = 3,
    TestKit = 4,
    Asset = 5,
}

impl LongMessageType {
    /// Permanent messages go to durable storage, the rest to temporary.
    #[inline]
    pub fn is_permanent(self) -> bool {
        matches!(
            self,
            LongMessageType::Firmware | LongMessageType::Framework | LongMessageType::Asset
        )
    }

    /// Name of the storage element holding this message.
    pub fn storage_name(self) -> String {
        (self as u8).to_string()
    }
}

impl TryFrom<u8> for LongMessageType {
    type Error = McuLinkError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(LongMessageType::Firmware),
            2 => Ok(LongMessageType::Framework),
            3 => Ok(LongMessageType::Configuration),
            4 => Ok(LongMessageType::TestKit),
            5 => Ok(LongMessageType::Asset),
            other => Err(McuLinkError::LongMessage(format!(
                "Invalid long message type {other}"
            ))),
        }
    }
}

impl fmt::Display for LongMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Status code reported by a status read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LongMessageStatus {
    Unused = 0,
    Upload = 1,
    Ready = 3,
    ValidationError = 4,
}

/// Status read result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongMessageStatusInfo {
    /// Nothing selected, or nothing stored for the selected type.
    Unused,
    /// An upload is in progress.
    Upload { md5: [u8; MD5_SIZE], length: u32 },
    /// A validated message is stored.
    Ready { md5: [u8; MD5_SIZE], length: u32 },
    /// The last upload failed validation.
    ValidationError,
}

impl LongMessageStatusInfo {
    /// Status code of this result.
    pub fn status(&self) -> LongMessageStatus {
        match self {
            LongMessageStatusInfo::Unused => LongMessageStatus::Unused,
            LongMessageStatusInfo::Upload { .. } => LongMessageStatus::Upload,
            LongMessageStatusInfo::Ready { .. } => LongMessageStatus::Ready,
            LongMessageStatusInfo::ValidationError => LongMessageStatus::ValidationError,
        }
    }

    /// Encode for the status read response.
    ///
    /// Upload and Ready: `[status][md5:16][length:u32 BE]`, otherwise just
    /// the status byte.
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            LongMessageStatusInfo::Upload { md5, length }
            | LongMessageStatusInfo::Ready { md5, length } => {
                let mut buf = Vec::with_capacity(1 + MD5_SIZE + 4);
                buf.push(self.status() as u8);
                buf.extend_from_slice(&md5);
                buf.extend_from_slice(&length.to_be_bytes());
                buf
            }
            _ => vec![self.status() as u8],
        }
    }

    /// Decode a status read response.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let invalid = || McuLinkError::LongMessage(format!("Invalid status response {buf:02x?}"));

        match buf {
            [0] => Ok(LongMessageStatusInfo::Unused),
            [4] => Ok(LongMessageStatusInfo::ValidationError),
            [status @ (1 | 3), rest @ ..] if rest.len() == MD5_SIZE + 4 => {
                let mut md5 = [0u8; MD5_SIZE];
                md5.copy_from_slice(&rest[..MD5_SIZE]);
                let mut length = [0u8; 4];
                length.copy_from_slice(&rest[MD5_SIZE..]);
                let length = u32::from_be_bytes(length);

                if *status == LongMessageStatus::Upload as u8 {
                    Ok(LongMessageStatusInfo::Upload { md5, length })
                } else {
                    Ok(LongMessageStatusInfo::Ready { md5, length })
                }
            }
            _ => Err(invalid()),
        }
    }
}

/// State of the long-message handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    /// No message type selected yet.
    Idle,
    /// A type is selected; its stored message can be read or activated.
    Read,
    /// An upload is in progress.
    Write,
    /// The last upload failed validation.
    Invalid,
}
