//! Long-message session state machine.
//!
//! ```text
//!          select            init             finalize (valid)
//! Idle ──────────► Read ──────────► Write ──────────────────► Read
//!                   ▲  ◄──select──   │  │
//!                   │                │  └──finalize (invalid)──► Invalid
//!                   └────select──────┴──────────────────────────────┘
//! ```
//!
//! `init_transfer` is accepted in every state but Idle, so an Invalid upload
//! can be restarted directly.

use bytes::Bytes;

use super::message::{md5_digest, ReceivedLongMessage};
use super::observer::LongMessageObserver;
use super::storage::LongMessageStorage;
use super::types::{HandlerState, LongMessageStatusInfo, LongMessageType, MD5_SIZE};
use crate::error::{McuLinkError, Result};

/// Receives long messages one at a time and commits valid ones to storage.
pub struct LongMessageHandler {
    storage: LongMessageStorage,
    state: HandlerState,
    message_type: Option<LongMessageType>,
    current: Option<ReceivedLongMessage>,
    observers: Vec<Box<dyn LongMessageObserver>>,
}

impl LongMessageHandler {
    /// Create an idle handler.
    pub fn new(storage: LongMessageStorage) -> Self {
        Self {
            storage,
            state: HandlerState::Idle,
            message_type: None,
            current: None,
            observers: Vec::new(),
        }
    }

    /// Register an observer.
    pub fn add_observer(&mut self, observer: Box<dyn LongMessageObserver>) {
        self.observers.push(observer);
    }

    /// Current state.
    pub fn state(&self) -> HandlerState {
        self.state
    }

    /// Selected message type, if any.
    pub fn message_type(&self) -> Option<LongMessageType> {
        self.message_type
    }

    /// Upload in progress, or the message last activated.
    pub fn current_message(&self) -> Option<&ReceivedLongMessage> {
        self.current.as_ref()
    }

    fn notify(&self, event: impl Fn(&dyn LongMessageObserver)) {
        for observer in &self.observers {
            event(observer.as_ref());
        }
    }

    /// Tell observers that the upload in progress is over.
    fn finish_upload(&self) {
        if self.state == HandlerState::Write {
            if let Some(message) = &self.current {
                self.notify(|o| o.upload_finished(message));
            }
        }
    }

    /// Status for the status read.
    pub fn read_status(&self) -> LongMessageStatusInfo {
        match (self.state, self.message_type, &self.current) {
            (HandlerState::Read, Some(message_type), _) => self.storage.read_status(message_type),
            (HandlerState::Invalid, ..) => LongMessageStatusInfo::ValidationError,
            (HandlerState::Write, _, Some(message)) => LongMessageStatusInfo::Upload {
                md5: *message.md5(),
                length: message.len() as u32,
            },
            _ => LongMessageStatusInfo::Unused,
        }
    }

    /// Select the message type to read or upload.
    ///
    /// An upload in progress is abandoned. Any message kept in memory is
    /// dropped, so the next activation reloads it from storage.
    pub fn select_long_message_type(&mut self, message_type: u8) -> Result<()> {
        let message_type = LongMessageType::try_from(message_type)?;
        tracing::debug!(%message_type, "select long message type");

        self.finish_upload();
        self.message_type = Some(message_type);
        self.state = HandlerState::Read;
        self.current = None;
        Ok(())
    }

    /// Start uploading a message of the selected type.
    ///
    /// `length` of 0 means the length is unknown and only the MD5 is checked.
    pub fn init_transfer(&mut self, md5: [u8; MD5_SIZE], length: u32) -> Result<()> {
        let message_type = match (self.state, self.message_type) {
            (HandlerState::Idle, _) | (_, None) => {
                return Err(McuLinkError::LongMessage(
                    "init-transfer needs to be called after select_long_message_type".to_string(),
                ))
            }
            (_, Some(message_type)) => message_type,
        };
        tracing::debug!(%message_type, md5 = %hex::encode(md5), length, "init transfer");

        self.finish_upload();
        let message = ReceivedLongMessage::new(message_type, md5, length);
        self.notify(|o| o.upload_started(&message));
        self.current = Some(message);
        self.state = HandlerState::Write;
        Ok(())
    }

    /// Append a chunk to the upload in progress.
    pub fn upload_message(&mut self, chunk: &[u8]) -> Result<()> {
        tracing::trace!(bytes = chunk.len(), "upload message");

        let message = match (self.state, self.current.as_mut()) {
            (HandlerState::Write, Some(message)) => message,
            _ => {
                return Err(McuLinkError::LongMessage(
                    "init-transfer needs to be called before upload_message".to_string(),
                ))
            }
        };
        message.append_data(chunk);

        if let Some(message) = &self.current {
            self.notify(|o| o.upload_progress(message));
        }
        Ok(())
    }

    /// Finish the upload in progress, or activate the stored message.
    ///
    /// - Read: load the stored message (if not in memory yet) and report it
    ///   as updated; only done when someone observes
    /// - Write: validate, then store and switch to Read, or switch to Invalid
    /// - Invalid: nothing happens
    /// - Idle: error
    pub fn finalize_message(&mut self) -> Result<()> {
        tracing::debug!(state = ?self.state, "finalize message");

        match self.state {
            HandlerState::Idle => Err(McuLinkError::LongMessage(
                "init-transfer needs to be called before finalize_message".to_string(),
            )),
            HandlerState::Read => self.activate_stored(),
            HandlerState::Write => self.commit_upload(),
            HandlerState::Invalid => Ok(()),
        }
    }

    fn activate_stored(&mut self) -> Result<()> {
        if self.observers.is_empty() {
            return Ok(());
        }

        let message_type = self.message_type.ok_or_else(|| {
            McuLinkError::LongMessage("no long message type selected".to_string())
        })?;

        if self.current.is_none() {
            let data = self.storage.get_long_message(message_type)?;
            let (md5, length) = match self.storage.read_status(message_type) {
                LongMessageStatusInfo::Ready { md5, length } => (md5, length),
                _ => (md5_digest(&data), data.len() as u32),
            };
            let mut message = ReceivedLongMessage::new(message_type, md5, length);
            message.append_data(&data);
            self.current = Some(message);
        }

        if let Some(message) = &self.current {
            self.notify(|o| o.message_updated(message));
        }
        Ok(())
    }

    fn commit_upload(&mut self) -> Result<()> {
        let message = self.current.as_ref().ok_or_else(|| {
            McuLinkError::LongMessage("no upload in progress".to_string())
        })?;

        self.notify(|o| o.upload_finished(message));

        if !message.is_valid() {
            tracing::warn!(?message, "long message failed validation");
            self.state = HandlerState::Invalid;
            return Ok(());
        }

        self.storage.set_long_message(message)?;
        self.notify(|o| o.message_updated(message));
        self.state = HandlerState::Read;
        Ok(())
    }

    /// Read the stored message of a type.
    pub fn get_long_message(&self, message_type: LongMessageType) -> Result<Bytes> {
        self.storage.get_long_message(message_type)
    }
}
