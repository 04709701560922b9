//! Byte-level adapter for the long-message handler.
//!
//! Writes carry a sub-opcode and its data; reads return the encoded status.
//!
//! | Sub-opcode | Request | Data |
//! |---|---|---|
//! | 0 | select type | 1 byte |
//! | 1 | init transfer | MD5 (16 bytes), optionally followed by a u32 BE length |
//! | 2 | upload | non-empty chunk |
//! | 3 | finalize | empty |

use bytes::Bytes;

use super::handler::LongMessageHandler;
use super::types::{LongMessageStatusInfo, LongMessageType, MD5_SIZE};
use crate::error::{McuLinkError, Result};
use crate::protocol::ResponseStatus;

/// Sub-opcode values.
pub mod sub_opcode {
    pub const SELECT_LONG_MESSAGE_TYPE: u8 = 0;
    pub const INIT_TRANSFER: u8 = 1;
    pub const UPLOAD_MESSAGE: u8 = 2;
    pub const FINALIZE_MESSAGE: u8 = 3;
}

/// Result code of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProtocolResult {
    Success = 0,
    InvalidAttributeLength = 1,
    UnlikelyError = 2,
}

impl TryFrom<u8> for ProtocolResult {
    type Error = McuLinkError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ProtocolResult::Success),
            1 => Ok(ProtocolResult::InvalidAttributeLength),
            2 => Ok(ProtocolResult::UnlikelyError),
            other => Err(McuLinkError::InvalidResponse(format!(
                "unknown long message result {other}"
            ))),
        }
    }
}

/// A write request, as built by the sending side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LongMessageRequest {
    Select(LongMessageType),
    Init {
        md5: [u8; MD5_SIZE],
        length: Option<u32>,
    },
    Upload(Bytes),
    Finalize,
}

impl LongMessageRequest {
    /// Encode as `[sub-opcode][data...]`.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            LongMessageRequest::Select(message_type) => {
                vec![sub_opcode::SELECT_LONG_MESSAGE_TYPE, *message_type as u8]
            }
            LongMessageRequest::Init { md5, length } => {
                let mut buf = Vec::with_capacity(1 + MD5_SIZE + 4);
                buf.push(sub_opcode::INIT_TRANSFER);
                buf.extend_from_slice(md5);
                if let Some(length) = length {
                    buf.extend_from_slice(&length.to_be_bytes());
                }
                buf
            }
            LongMessageRequest::Upload(chunk) => {
                let mut buf = Vec::with_capacity(1 + chunk.len());
                buf.push(sub_opcode::UPLOAD_MESSAGE);
                buf.extend_from_slice(chunk);
                buf
            }
            LongMessageRequest::Finalize => vec![sub_opcode::FINALIZE_MESSAGE],
        }
    }

    /// Init request for a message of `length` bytes.
    ///
    /// The length field is a u32, so longer messages are rejected.
    pub fn init(md5: [u8; MD5_SIZE], length: usize) -> Result<LongMessageRequest> {
        let length = u32::try_from(length).map_err(|_| {
            McuLinkError::LongMessage(format!(
                "message of {length} bytes does not fit the length field"
            ))
        })?;
        Ok(LongMessageRequest::Init {
            md5,
            length: Some(length),
        })
    }

    /// Every request needed to upload `data` in `chunk_size` pieces.
    pub fn upload_sequence(
        message_type: LongMessageType,
        data: &Bytes,
        chunk_size: usize,
    ) -> Result<Vec<LongMessageRequest>> {
        let chunk_size = chunk_size.max(1);
        let mut requests = vec![
            LongMessageRequest::Select(message_type),
            LongMessageRequest::init(super::message::md5_digest(data), data.len())?,
        ];
        requests.extend((0..data.len()).step_by(chunk_size).map(|start| {
            LongMessageRequest::Upload(data.slice(start..(start + chunk_size).min(data.len())))
        }));
        requests.push(LongMessageRequest::Finalize);
        Ok(requests)
    }
}

/// Wraps a [`LongMessageHandler`] with the byte-level protocol.
pub struct LongMessageProtocol {
    handler: LongMessageHandler,
}

impl LongMessageProtocol {
    pub fn new(handler: LongMessageHandler) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &LongMessageHandler {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut LongMessageHandler {
        &mut self.handler
    }

    /// Encoded status of the handler.
    pub fn handle_read(&self) -> Vec<u8> {
        self.handler.read_status().encode()
    }

    /// Decoded status of the handler.
    pub fn status(&self) -> LongMessageStatusInfo {
        self.handler.read_status()
    }

    /// Run one write request.
    ///
    /// Malformed requests are answered with a result code. Requests that are
    /// well formed but not allowed in the current state return the handler's
    /// error.
    pub fn handle_write(&mut self, opcode: u8, data: &[u8]) -> Result<ProtocolResult> {
        let result = match opcode {
            sub_opcode::SELECT_LONG_MESSAGE_TYPE => match data {
                [message_type] => {
                    self.handler.select_long_message_type(*message_type)?;
                    ProtocolResult::Success
                }
                _ => ProtocolResult::InvalidAttributeLength,
            },
            sub_opcode::INIT_TRANSFER => match data.len() {
                MD5_SIZE => {
                    self.handler.init_transfer(md5_from(data), 0)?;
                    ProtocolResult::Success
                }
                len if len == MD5_SIZE + 4 => {
                    let mut length = [0u8; 4];
                    length.copy_from_slice(&data[MD5_SIZE..]);
                    self.handler
                        .init_transfer(md5_from(data), u32::from_be_bytes(length))?;
                    ProtocolResult::Success
                }
                _ => ProtocolResult::InvalidAttributeLength,
            },
            sub_opcode::UPLOAD_MESSAGE => {
                if data.is_empty() {
                    ProtocolResult::InvalidAttributeLength
                } else {
                    self.handler.upload_message(data)?;
                    ProtocolResult::Success
                }
            }
            sub_opcode::FINALIZE_MESSAGE => {
                if data.is_empty() {
                    self.handler.finalize_message()?;
                    ProtocolResult::Success
                } else {
                    ProtocolResult::InvalidAttributeLength
                }
            }
            _ => ProtocolResult::UnlikelyError,
        };

        if result != ProtocolResult::Success {
            tracing::warn!(opcode, len = data.len(), ?result, "long message request rejected");
        }
        Ok(result)
    }

    /// Run a write given as `[sub-opcode][data...]`.
    pub fn handle_payload(&mut self, payload: &[u8]) -> Result<ProtocolResult> {
        match payload {
            [opcode, data @ ..] => self.handle_write(*opcode, data),
            [] => Ok(ProtocolResult::UnlikelyError),
        }
    }

    /// Answer a command carrying long-message traffic.
    ///
    /// An empty payload reads the encoded status. Anything else is a write,
    /// answered with its one-byte result. A write refused by the handler is
    /// answered with `CommandError`.
    pub fn respond(&mut self, payload: &[u8]) -> (ResponseStatus, Vec<u8>) {
        if payload.is_empty() {
            return (ResponseStatus::Ok, self.handle_read());
        }
        match self.handle_payload(payload) {
            Ok(result) => (ResponseStatus::Ok, vec![result as u8]),
            Err(e) => {
                tracing::warn!(error = %e, "long message write refused");
                (ResponseStatus::CommandError, Vec::new())
            }
        }
    }
}

fn md5_from(data: &[u8]) -> [u8; MD5_SIZE] {
    let mut md5 = [0u8; MD5_SIZE];
    md5.copy_from_slice(&data[..MD5_SIZE]);
    md5
}
