//! Typed command definitions and response dispatch.
//!
//! Every MCU command is a zero-sized type implementing [`Command`]: an opcode
//! plus an encoder for its arguments and a decoder for its successful
//! response payload. [`execute`] sends the encoded payload through a
//! [`CommandLink`] and maps the response status to the decoded value or to
//! an error.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use mcu_link::command::{execute, Command, ReadMotorPortAmount};
//! use mcu_link::protocol::ResponseStatus;
//! use mcu_link::transport::{CommandLink, Response};
//!
//! struct SixPorts;
//!
//! impl CommandLink for SixPorts {
//!     fn send_command(&self, command_id: u8, _payload: &[u8]) -> mcu_link::Result<Response> {
//!         assert_eq!(command_id, ReadMotorPortAmount::ID);
//!         Ok(Response::new(ResponseStatus::Ok, Bytes::from_static(&[6])))
//!     }
//! }
//!
//! let amount = execute::<ReadMotorPortAmount>(&SixPorts, &()).unwrap();
//! assert_eq!(amount, 6);
//! ```

use bytes::Bytes;

use crate::error::{McuLinkError, Result};
use crate::protocol::ResponseStatus;
use crate::transport::{CommandLink, Response};

/// A single MCU command.
pub trait Command {
    /// Opcode sent in the frame header.
    const ID: u8;
    /// Name used in log output.
    const NAME: &'static str;

    /// Arguments accepted by the command.
    type Args: ?Sized;
    /// Value decoded from a successful response.
    type Output;

    /// Encode the arguments into a frame payload.
    fn encode(args: &Self::Args) -> Result<Vec<u8>>;

    /// Decode the payload of an `Ok` response.
    fn decode(payload: Bytes) -> Result<Self::Output>;
}

/// Send command `C` and decode its response.
///
/// - `Ok` responses are decoded with `C::decode`
/// - `UnknownCommand` becomes [`McuLinkError::UnknownCommand`]
/// - any other status (including `Timeout`) becomes
///   [`McuLinkError::CommandFailed`] carrying the status and raw payload
pub fn execute<C: Command>(link: &dyn CommandLink, args: &C::Args) -> Result<C::Output> {
    let payload = C::encode(args)?;
    let response = link.send_command(C::ID, &payload)?;
    process::<C>(&payload, response)
}

fn process<C: Command>(request: &[u8], response: Response) -> Result<C::Output> {
    C::decode(check_response(C::ID, C::NAME, request, response)?)
}

/// Payload of an `Ok` response, or the error for any other status.
pub(crate) fn check_response(
    command_id: u8,
    name: &'static str,
    request: &[u8],
    response: Response,
) -> Result<Bytes> {
    match response.status {
        ResponseStatus::Ok => Ok(response.payload),
        ResponseStatus::UnknownCommand => {
            tracing::warn!(command = name, id = command_id, "command not implemented by MCU");
            Err(McuLinkError::UnknownCommand(command_id))
        }
        status => {
            tracing::warn!(
                command = name,
                id = command_id,
                ?status,
                request = ?request,
                request_len = request.len(),
                response = ?&response.payload[..],
                "command failed"
            );
            Err(McuLinkError::CommandFailed {
                command_id,
                status,
                payload: response.payload,
            })
        }
    }
}
