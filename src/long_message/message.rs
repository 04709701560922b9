//! A long message being received.

use std::fmt;

use bytes::{Bytes, BytesMut};
use md5::{Digest, Md5};

use super::types::{LongMessageType, MD5_SIZE};

/// MD5 digest of `data`.
pub fn md5_digest(data: &[u8]) -> [u8; MD5_SIZE] {
    let mut digest = [0u8; MD5_SIZE];
    digest.copy_from_slice(&Md5::digest(data));
    digest
}

/// Buffer for one incoming long message.
///
/// Accumulates chunks and their running MD5.
pub struct ReceivedLongMessage {
    message_type: LongMessageType,
    md5: [u8; MD5_SIZE],
    expected_length: u32,
    received_chunks: u32,
    data: BytesMut,
    hasher: Md5,
}

impl ReceivedLongMessage {
    /// Start a message. `expected_length` of 0 means unknown.
    pub fn new(message_type: LongMessageType, md5: [u8; MD5_SIZE], expected_length: u32) -> Self {
        Self {
            message_type,
            md5,
            expected_length,
            received_chunks: 0,
            data: BytesMut::new(),
            hasher: Md5::new(),
        }
    }

    /// Append one chunk.
    pub fn append_data(&mut self, chunk: &[u8]) {
        self.received_chunks += 1;
        self.data.extend_from_slice(chunk);
        self.hasher.update(chunk);
    }

    /// Check the received data against the declared MD5 and length.
    pub fn is_valid(&self) -> bool {
        if self.expected_length != 0 && self.data.len() as u64 != u64::from(self.expected_length) {
            return false;
        }
        self.hasher.clone().finalize().as_slice() == self.md5
    }

    /// Type selected when the transfer started.
    pub fn message_type(&self) -> LongMessageType {
        self.message_type
    }

    /// Declared MD5 digest.
    pub fn md5(&self) -> &[u8; MD5_SIZE] {
        &self.md5
    }

    /// Declared MD5 digest as lowercase hex.
    pub fn md5_hex(&self) -> String {
        hex::encode(self.md5)
    }

    /// Declared length, 0 if unknown.
    pub fn expected_length(&self) -> u32 {
        self.expected_length
    }

    /// Chunks appended so far.
    pub fn received_chunks(&self) -> u32 {
        self.received_chunks
    }

    /// Bytes received so far.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copy of the bytes received so far.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.data)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for ReceivedLongMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceivedLongMessage")
            .field("message_type", &self.message_type)
            .field("md5", &self.md5_hex())
            .field("expected_length", &self.expected_length)
            .field("received_chunks", &self.received_chunks)
            .field("received_bytes", &self.data.len())
            .finish()
    }
}
