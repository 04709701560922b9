//! Long messages: payloads too large for a single command.
//!
//! A long message is selected by type, announced with its MD5 (and
//! optionally its length), uploaded in chunks and finalized. Validated
//! messages are persisted through [`LongMessageStorage`].
//!
//! - [`LongMessageHandler`] - state machine driving a transfer
//! - [`LongMessageProtocol`] - sub-opcode framing around the handler
//! - [`LongMessageClient`] - uploads over a command link
//! - [`LongMessageStorage`] - permanent and temporary message stores
//! - [`LongMessageObserver`] - transfer notifications

mod client;
mod handler;
mod message;
mod observer;
mod protocol;
mod storage;
mod types;

pub use client::{LongMessageClient, MAX_CHUNK_SIZE};
pub use handler::LongMessageHandler;
pub use message::{md5_digest, ReceivedLongMessage};
pub use observer::{ChannelObserver, LongMessageEvent, LongMessageObserver};
pub use protocol::{sub_opcode, LongMessageProtocol, LongMessageRequest, ProtocolResult};
pub use storage::{FileStorage, LongMessageStorage, MemoryStorage, Storage, StorageMetadata};
pub use types::{
    HandlerState, LongMessageStatus, LongMessageStatusInfo, LongMessageType, MD5_SIZE,
};
