//! Transport module - byte channels and the command exchange state machine.
//!
//! - [`ByteChannel`]: raw read/write access to one bus address
//! - [`LinkTransport`]: framing, busy/pending handling, and local retries
//! - [`CommandLink`]: the interface higher layers send commands through

mod channel;
mod link;

pub use channel::{ByteChannel, IoChannel};
pub use link::{CommandLink, LinkTransport, Response};
