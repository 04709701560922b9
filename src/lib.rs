//! # mcu-link
//!
//! Controller-side driver for the request/response protocol spoken with a
//! peripheral MCU over a half-duplex byte channel such as I2C.
//!
//! ## Architecture
//!
//! - **Framing** ([`protocol`]): CRC-7 protected headers, CRC-16 protected payloads
//! - **Transport** ([`transport`]): send, busy/pending polling, local retries
//! - **Commands** ([`command`]): typed opcode table and per-mode control facades
//! - **Long messages** ([`long_message`]): chunked uploads validated by MD5
//! - **Firmware** ([`firmware`]): catalog, image validation and the update flow
//!
//! ## Example
//!
//! ```no_run
//! use std::fs::OpenOptions;
//!
//! use mcu_link::command::McuInterfaces;
//! use mcu_link::config::LinkConfig;
//! use mcu_link::transport::IoChannel;
//!
//! fn main() -> mcu_link::Result<()> {
//!     // Both device nodes are bound to their bus address by the platform.
//!     let app = OpenOptions::new().read(true).write(true).open("/dev/mcu-app")?;
//!     let boot = OpenOptions::new().read(true).write(true).open("/dev/mcu-boot")?;
//!
//!     let mcu = McuInterfaces::from_channels(
//!         IoChannel::new(app),
//!         IoChannel::new(boot),
//!         &LinkConfig::default(),
//!     );
//!     mcu.application.ping()?;
//!     println!("firmware: {:?}", mcu.application.get_firmware_version()?);
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod error_memory;
pub mod firmware;
pub mod long_message;
pub mod protocol;
pub mod status;
pub mod transport;

pub use command::{ApplicationControl, BootloaderControl, McuInterfaces, RebootOutcome};
pub use error::{McuLinkError, Result};
pub use transport::{ByteChannel, CommandLink, LinkTransport, Response};
