//! Request/response exchange over a byte channel.
//!
//! One call to [`CommandLink::send_command`] drives a full exchange:
//!
//! ```text
//! write Start ─► read header ──Busy──► read header again (until timeout)
//!                    │
//!                    ├─Pending──► write GetResult ─► read header ... (while Pending)
//!                    │
//!                    ├─CommandIntegrityError──► resend Start (bounded)
//!                    │
//!                    └─anything else──► read header+payload, verify, return
//! ```
//!
//! Header and payload reads are retried locally a bounded number of times;
//! running out of attempts yields `McuLinkError::BrokenChannel`. A command
//! that stays busy longer than the configured timeout returns a response
//! with `ResponseStatus::Timeout` instead of an error.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use bytes::Bytes;

use super::channel::ByteChannel;
use crate::config::LinkConfig;
use crate::error::{McuLinkError, Result};
use crate::protocol::{
    encode_bare_command, encode_command, Operation, ResponseHeader, ResponseStatus, HEADER_SIZE,
};

/// Outcome of a single command exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Final status reported by the MCU (or `Timeout`).
    pub status: ResponseStatus,
    /// Verified response payload.
    pub payload: Bytes,
}

impl Response {
    /// Create a response.
    pub fn new(status: ResponseStatus, payload: Bytes) -> Self {
        Self { status, payload }
    }

    /// A response for a command that never left the Busy state.
    pub fn timeout() -> Self {
        Self::new(ResponseStatus::Timeout, Bytes::new())
    }

    /// Check if the MCU reported success.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }
}

/// Anything that can execute a command against the MCU.
///
/// Implemented by [`LinkTransport`]; tests implement it directly to fake an
/// MCU at the response level.
pub trait CommandLink: Send + Sync {
    /// Send a command and wait for its final response.
    fn send_command(&self, command_id: u8, payload: &[u8]) -> Result<Response>;
}

impl<T: CommandLink + ?Sized> CommandLink for std::sync::Arc<T> {
    fn send_command(&self, command_id: u8, payload: &[u8]) -> Result<Response> {
        (**self).send_command(command_id, payload)
    }
}

/// Link transport owning one byte channel.
///
/// All exchanges are serialized by an internal lock, so a transport can be
/// shared between threads behind an `Arc`.
pub struct LinkTransport<C> {
    channel: Mutex<C>,
    config: LinkConfig,
}

impl<C: ByteChannel> LinkTransport<C> {
    /// Create a transport with default configuration.
    pub fn new(channel: C) -> Self {
        Self::with_config(channel, LinkConfig::default())
    }

    /// Create a transport with custom configuration.
    pub fn with_config(channel: C, config: LinkConfig) -> Self {
        Self {
            channel: Mutex::new(channel),
            config,
        }
    }

    /// Get the active configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Consume the transport and return the channel.
    pub fn into_inner(self) -> C {
        self.channel
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run Start (and GetResult polling) once.
    ///
    /// Returns `None` when the MCU stayed busy past the timeout.
    fn exchange(
        &self,
        channel: &mut C,
        command_id: u8,
        start: &[u8],
        get_result: &mut Option<[u8; 6]>,
    ) -> Result<Option<ResponseHeader>> {
        let mut header = match self.send_frame(channel, start)? {
            Some(header) => header,
            None => return Ok(None),
        };

        while header.status == ResponseStatus::Pending {
            let frame = get_result
                .get_or_insert_with(|| encode_bare_command(Operation::GetResult, command_id));
            header = match self.send_frame(channel, &frame[..])? {
                Some(header) => header,
                None => return Ok(None),
            };
        }

        Ok(Some(header))
    }

    /// Write a frame and read headers until the MCU is no longer busy.
    fn send_frame(&self, channel: &mut C, frame: &[u8]) -> Result<Option<ResponseHeader>> {
        channel.write(frame)?;

        let started = Instant::now();
        while started.elapsed() < self.config.response_timeout {
            let header = self.read_header(channel)?;
            if header.status != ResponseStatus::Busy {
                return Ok(Some(header));
            }
        }
        Ok(None)
    }

    fn read_header(&self, channel: &mut C) -> Result<ResponseHeader> {
        retry(self.config.header_read_retries, "Read response header", || {
            let bytes = channel.read(HEADER_SIZE)?;
            ResponseHeader::decode(&bytes)
        })
    }

    /// Read the payload belonging to `header`.
    ///
    /// The channel returns the response from its first byte, so the header
    /// is read again and must match the one already accepted.
    fn read_payload(&self, channel: &mut C, header: &ResponseHeader) -> Result<Bytes> {
        let length = header.payload_length as usize;
        if length == 0 {
            return Ok(Bytes::new());
        }

        retry(self.config.payload_read_retries, "Read payload", || {
            let bytes = channel.read(HEADER_SIZE + length)?;
            if !header.is_same_as(&bytes) {
                return Err(McuLinkError::HeaderMismatch);
            }
            if bytes.len() < HEADER_SIZE + length {
                return Err(McuLinkError::PayloadTruncated {
                    expected: length,
                    received: bytes.len().saturating_sub(HEADER_SIZE),
                });
            }

            let payload = &bytes[HEADER_SIZE..HEADER_SIZE + length];
            if !header.validate_payload(payload) {
                return Err(McuLinkError::PayloadChecksum);
            }
            Ok(Bytes::copy_from_slice(payload))
        })
    }
}

impl<C: ByteChannel> CommandLink for LinkTransport<C> {
    fn send_command(&self, command_id: u8, payload: &[u8]) -> Result<Response> {
        let start = encode_command(Operation::Start, command_id, payload)?;
        let mut get_result = None;
        let mut integrity_errors = 0u32;

        let mut guard = self.channel.lock().unwrap_or_else(PoisonError::into_inner);
        let channel = &mut *guard;

        loop {
            let header = match self.exchange(channel, command_id, &start, &mut get_result)? {
                Some(header) => header,
                None => {
                    tracing::warn!(command_id, "MCU stayed busy until the response timeout");
                    return Ok(Response::timeout());
                }
            };

            if header.status != ResponseStatus::CommandIntegrityError {
                let payload = self.read_payload(channel, &header)?;
                return Ok(Response::new(header.status, payload));
            }

            integrity_errors += 1;
            if integrity_errors > self.config.max_command_retries {
                return Err(McuLinkError::IntegrityRetriesExhausted {
                    command_id,
                    attempts: integrity_errors,
                });
            }
            tracing::debug!(
                command_id,
                attempt = integrity_errors,
                "MCU reported command integrity error, resending"
            );
        }
    }
}

/// Run `op` up to `attempts` times, returning the first success.
fn retry<T>(attempts: u32, what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) => tracing::warn!(attempt, error = %e, "{what} failed"),
        }
    }
    tracing::error!(attempts, "{what}: retry limit reached");
    Err(McuLinkError::BrokenChannel(format!("{what}: retry limit reached")))
}
