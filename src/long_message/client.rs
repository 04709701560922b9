//! Sending side of long-message transfers over a command link.
//!
//! Every request travels as the payload of one command. Writes are answered
//! with a one-byte [`ProtocolResult`]; a command with an empty payload reads
//! the encoded status.

use std::sync::Arc;

use bytes::Bytes;

use super::protocol::{LongMessageRequest, ProtocolResult};
use super::types::{LongMessageStatusInfo, LongMessageType, MD5_SIZE};
use crate::command::check_response;
use crate::error::{McuLinkError, Result};
use crate::protocol::MAX_PAYLOAD_SIZE;
use crate::transport::CommandLink;

/// Largest chunk that fits a command next to its sub-opcode.
pub const MAX_CHUNK_SIZE: usize = MAX_PAYLOAD_SIZE - 1;

const NAME: &str = "LongMessage";

/// Uploads long messages through a [`CommandLink`].
pub struct LongMessageClient {
    link: Arc<dyn CommandLink>,
    command_id: u8,
}

impl LongMessageClient {
    /// Client sending its requests as command `command_id`.
    pub fn new(link: Arc<dyn CommandLink>, command_id: u8) -> Self {
        Self { link, command_id }
    }

    pub fn command_id(&self) -> u8 {
        self.command_id
    }

    /// Select the type of the next transfer.
    pub fn select(&self, message_type: LongMessageType) -> Result<()> {
        self.write(&LongMessageRequest::Select(message_type))
    }

    /// Announce a transfer. `None` leaves the length unchecked.
    pub fn init(&self, md5: [u8; MD5_SIZE], length: Option<u32>) -> Result<()> {
        self.write(&LongMessageRequest::Init { md5, length })
    }

    /// Send one chunk of at most [`MAX_CHUNK_SIZE`] bytes.
    pub fn upload(&self, chunk: &[u8]) -> Result<()> {
        self.write(&LongMessageRequest::Upload(Bytes::copy_from_slice(chunk)))
    }

    pub fn finalize(&self) -> Result<()> {
        self.write(&LongMessageRequest::Finalize)
    }

    /// Status of the selected message.
    pub fn read_status(&self) -> Result<LongMessageStatusInfo> {
        let response = self.link.send_command(self.command_id, &[])?;
        let payload = check_response(self.command_id, NAME, &[], response)?;
        LongMessageStatusInfo::decode(&payload)
    }

    /// Upload `data` as a complete message and return the resulting status.
    pub fn send_message(
        &self,
        message_type: LongMessageType,
        data: &Bytes,
        chunk_size: usize,
    ) -> Result<LongMessageStatusInfo> {
        let chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        let requests = LongMessageRequest::upload_sequence(message_type, data, chunk_size)?;
        tracing::info!(
            %message_type,
            len = data.len(),
            requests = requests.len(),
            "uploading long message"
        );
        for request in &requests {
            self.write(request)?;
        }
        self.read_status()
    }

    fn write(&self, request: &LongMessageRequest) -> Result<()> {
        let payload = request.encode();
        let response = self.link.send_command(self.command_id, &payload)?;
        let reply = check_response(self.command_id, NAME, &payload, response)?;

        match reply.first() {
            Some(&code) => match ProtocolResult::try_from(code)? {
                ProtocolResult::Success => Ok(()),
                result => {
                    tracing::warn!(?request, ?result, "long message request rejected by MCU");
                    Err(McuLinkError::LongMessage(format!(
                        "request rejected: {result:?}"
                    )))
                }
            },
            None => Err(McuLinkError::InvalidResponse(
                "empty long message result".to_string(),
            )),
        }
    }
}

impl std::fmt::Debug for LongMessageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LongMessageClient")
            .field("command_id", &self.command_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::long_message::{
        md5_digest, HandlerState, LongMessageHandler, LongMessageProtocol, LongMessageStorage,
    };
    use crate::protocol::ResponseStatus;
    use crate::transport::Response;
    use std::sync::Mutex;

    const COMMAND: u8 = 0x40;

    /// Answers the long-message command with a local protocol instance.
    struct Loopback {
        protocol: Mutex<LongMessageProtocol>,
        chunks: Mutex<Vec<usize>>,
    }

    impl Loopback {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                protocol: Mutex::new(LongMessageProtocol::new(LongMessageHandler::new(
                    LongMessageStorage::in_memory(),
                ))),
                chunks: Mutex::new(Vec::new()),
            })
        }
    }

    impl CommandLink for Loopback {
        fn send_command(&self, command_id: u8, payload: &[u8]) -> Result<Response> {
            if command_id != COMMAND {
                return Ok(Response::new(ResponseStatus::UnknownCommand, Bytes::new()));
            }
            if payload.first() == Some(&2) {
                self.chunks.lock().unwrap().push(payload.len() - 1);
            }
            let (status, reply) = self.protocol.lock().unwrap().respond(payload);
            Ok(Response::new(status, Bytes::from(reply)))
        }
    }

    #[test]
    fn test_send_message_is_stored() {
        let link = Loopback::new();
        let client = LongMessageClient::new(link.clone(), COMMAND);
        let data = Bytes::from_static(b"long message body");

        let status = client
            .send_message(LongMessageType::Configuration, &data, 4)
            .unwrap();
        assert_eq!(
            status,
            LongMessageStatusInfo::Ready {
                md5: md5_digest(&data),
                length: 17
            }
        );
        assert_eq!(*link.chunks.lock().unwrap(), vec![4, 4, 4, 4, 1]);

        let protocol = link.protocol.lock().unwrap();
        assert_eq!(protocol.handler().state(), HandlerState::Read);
        assert_eq!(
            protocol
                .handler()
                .get_long_message(LongMessageType::Configuration)
                .unwrap(),
            data
        );
    }

    #[test]
    fn test_chunk_size_is_clamped_to_frame() {
        let link = Loopback::new();
        let client = LongMessageClient::new(link.clone(), COMMAND);
        let data = Bytes::from(vec![0x5A; 300]);

        client
            .send_message(LongMessageType::Asset, &data, 1000)
            .unwrap();
        assert_eq!(*link.chunks.lock().unwrap(), vec![254, 46]);
    }

    #[test]
    fn test_result_code_becomes_error() {
        let client = LongMessageClient::new(Loopback::new(), COMMAND);
        client.select(LongMessageType::Firmware).unwrap();

        // An empty chunk is answered with InvalidAttributeLength.
        let result = client.write(&LongMessageRequest::Upload(Bytes::new()));
        assert!(matches!(result, Err(McuLinkError::LongMessage(_))));
    }

    #[test]
    fn test_refused_write_is_command_failure() {
        let client = LongMessageClient::new(Loopback::new(), COMMAND);
        match client.upload(b"too early") {
            Err(McuLinkError::CommandFailed {
                command_id, status, ..
            }) => {
                assert_eq!(command_id, COMMAND);
                assert_eq!(status, ResponseStatus::CommandError);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_command_is_typed() {
        let client = LongMessageClient::new(Loopback::new(), 0x41);
        assert!(matches!(
            client.read_status(),
            Err(McuLinkError::UnknownCommand(0x41))
        ));
    }

    #[test]
    fn test_steps_match_send_message() {
        let link = Loopback::new();
        let client = LongMessageClient::new(link.clone(), COMMAND);

        client.select(LongMessageType::TestKit).unwrap();
        client.init(md5_digest(b"kit"), None).unwrap();
        assert!(matches!(
            client.read_status().unwrap(),
            LongMessageStatusInfo::Upload { length: 0, .. }
        ));
        client.upload(b"kit").unwrap();
        client.finalize().unwrap();
        assert!(matches!(
            client.read_status().unwrap(),
            LongMessageStatusInfo::Ready { length: 3, .. }
        ));
    }
}
