//! Cycle-level model of a control/status register interconnect.
//!
//! Registers built from typed bit fields sit behind chunked multiplexers in
//! CSR banks, reachable through address decoders, a round-robin arbiter and
//! a Wishbone-to-CSR bridge. Every component is clocked explicitly with
//! `step`, which returns the outputs of the current cycle and then applies
//! the clock edge.

/// Bit-vector helpers.
pub mod bits;
pub use bits::MAX_REGISTER_WIDTH;

/// Construction errors.
pub mod error;
pub use error::{BuildError, ErrorKind};

/// Address windows and range decoding.
pub mod router;
pub use router::{AddressRangeRouter, AddressWindow, MapShape, Subordinate};

/// Round-robin grant selection.
pub mod scheduler;
pub use scheduler::{RoundRobin, MAX_REQUESTERS};

/// Fields, registers, chunked access, banks and the CSR bus.
pub mod csr;
pub use csr::{
    Access, Bank, BankConfig, ChunkedAccessMux, CsrTarget, ElementRequest, ElementResponse, Field,
    Register, RegisterBuilder,
};

/// Wishbone interfaces, decoder, arbiter and memory.
pub mod wishbone;
pub use wishbone::{Arbiter, Features, SharedInterconnect, Sram, WishboneTarget};

/// Wishbone front-end for CSR buses.
pub mod bridge;
pub use bridge::WishboneCsrBridge;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
