//! Wishbone bus model: interface description, decoder, arbiter and memory.

mod arbiter;
mod bus;
mod decoder;
mod sram;

pub use arbiter::{Arbiter, SharedInterconnect};
pub use bus::{BurstTypeExt, BusParams, CycleType, Features, Request, Response, WishboneTarget};
pub use decoder::Decoder;
pub use sram::Sram;
