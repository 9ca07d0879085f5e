//! Serial control link to the desktop configurator.

mod channel;
mod connection;
mod error;

pub use channel::{ControlChannel, Request, ACK, ATTENTION, IDENT_REPLY};
pub use connection::{Connection, ConnectionExt};
pub use error::Error;
