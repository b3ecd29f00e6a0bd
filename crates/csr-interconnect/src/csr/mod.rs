//! Control/status register model: fields, registers, chunked access and banks.

mod access;
mod bank;
pub(crate) mod bus;
mod decoder;
mod field;
mod mux;
mod register;

pub use access::Access;
pub use bank::{Bank, BankConfig};
pub use bus::{BusParams, CsrTarget, Request, Response};
pub use decoder::Decoder;
pub use field::Field;
pub use mux::ChunkedAccessMux;
pub use register::{ElementRequest, ElementResponse, Register, RegisterBuilder};
