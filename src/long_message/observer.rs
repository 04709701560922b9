//! Notifications about long-message transfers.
//!
//! The handler calls a [`LongMessageObserver`] on every transition that an
//! outer layer may care about. [`ChannelObserver`] turns those calls into
//! [`LongMessageEvent`]s on a tokio channel so an async task can react.
//!
//! # Example
//!
//! ```
//! use mcu_link::long_message::{ChannelObserver, LongMessageEvent, LongMessageHandler, LongMessageStorage};
//!
//! let (observer, mut events) = ChannelObserver::new();
//! let mut handler = LongMessageHandler::new(LongMessageStorage::in_memory());
//! handler.add_observer(Box::new(observer));
//!
//! handler.select_long_message_type(3).unwrap();
//! handler.init_transfer([0; 16], 0).unwrap();
//!
//! assert!(matches!(events.try_recv(), Ok(LongMessageEvent::UploadStarted { .. })));
//! ```

use bytes::Bytes;
use tokio::sync::mpsc;

use super::message::ReceivedLongMessage;
use super::types::{LongMessageType, MD5_SIZE};

/// Receives long-message transfer notifications.
///
/// All methods default to doing nothing.
pub trait LongMessageObserver: Send {
    /// A new upload began.
    fn upload_started(&self, _message: &ReceivedLongMessage) {}

    /// A chunk was appended.
    fn upload_progress(&self, _message: &ReceivedLongMessage) {}

    /// An upload ended, either finalized or abandoned.
    fn upload_finished(&self, _message: &ReceivedLongMessage) {}

    /// A message became active: freshly uploaded and validated, or already
    /// stored and re-activated. The stored message may be empty; checking
    /// for that is up to the observer.
    fn message_updated(&self, _message: &ReceivedLongMessage) {}
}

/// Owned notification sent by [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LongMessageEvent {
    UploadStarted {
        message_type: LongMessageType,
        md5: [u8; MD5_SIZE],
        expected_length: u32,
    },
    UploadProgress {
        message_type: LongMessageType,
        received_bytes: usize,
        received_chunks: u32,
    },
    UploadFinished {
        message_type: LongMessageType,
        received_bytes: usize,
    },
    MessageUpdated {
        message_type: LongMessageType,
        md5: [u8; MD5_SIZE],
        data: Bytes,
    },
}

/// Observer forwarding events to an unbounded tokio channel.
///
/// Events are dropped silently once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<LongMessageEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LongMessageEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: LongMessageEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("long message event receiver dropped");
        }
    }
}

impl LongMessageObserver for ChannelObserver {
    fn upload_started(&self, message: &ReceivedLongMessage) {
        self.send(LongMessageEvent::UploadStarted {
            message_type: message.message_type(),
            md5: *message.md5(),
            expected_length: message.expected_length(),
        });
    }

    fn upload_progress(&self, message: &ReceivedLongMessage) {
        self.send(LongMessageEvent::UploadProgress {
            message_type: message.message_type(),
            received_bytes: message.len(),
            received_chunks: message.received_chunks(),
        });
    }

    fn upload_finished(&self, message: &ReceivedLongMessage) {
        self.send(LongMessageEvent::UploadFinished {
            message_type: message.message_type(),
            received_bytes: message.len(),
        });
    }

    fn message_updated(&self, message: &ReceivedLongMessage) {
        self.send(LongMessageEvent::MessageUpdated {
            message_type: message.message_type(),
            md5: *message.md5(),
            data: message.to_bytes(),
        });
    }
}
