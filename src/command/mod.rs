//! Command module - the opcode table and the per-mode control interfaces.
//!
//! - [`Command`] / [`execute`]: typed encode/decode around one opcode
//! - the command types themselves, one per opcode
//! - [`ApplicationControl`] / [`BootloaderControl`]: method-per-command facades

mod commands;
mod control;
mod dispatch;

pub use commands::*;
pub use control::{ApplicationControl, BootloaderControl, McuInterfaces, RebootOutcome};
pub use dispatch::{execute, Command};
pub(crate) use dispatch::check_response;
