//! Daisy-chain plumbing: boot-time address enumeration and the per-address
//! button state table fed by the I2C receive callback.

mod enumerator;
mod state;

pub use enumerator::{ChainInfo, Enumerator};
pub use state::{ButtonState, StateTable};

/// General-call address every module listens on until it owns an address.
pub const BROADCAST_ADDR: u8 = 0;
/// The head's own address while it plays I2C master.
pub const MASTER_ADDR: u8 = 1;
/// First address handed out to the chain.
pub const BASE_ASSIGN_ADDR: u8 = 2;
/// Upper bound on chain length: the 7-bit address space minus the broadcast
/// and master addresses.
pub const MAX_MODULES: usize = 126;
