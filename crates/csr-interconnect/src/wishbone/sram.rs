//! Word-organised memory behind a Wishbone interface.

use log::{debug, trace};

use crate::bits::mask64;
use crate::error::BuildError;
use crate::wishbone::{BusParams, Request, Response, WishboneTarget};

/// Memory of `depth` words answering single transfers with one wait state.
///
/// Read data is combinational from the addressed word; `ack` is registered
/// and asserted on the cycle after the strobe, then dropped for one cycle so
/// that back-to-back transfers each see exactly one acknowledge. Writes land
/// lane by lane as selected by `sel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sram {
    params: BusParams,
    memory: Vec<u64>,
    read_only: bool,
    ack: bool,
}

impl Sram {
    /// Creates a zero-filled memory.
    ///
    /// # Errors
    ///
    /// - [`BuildError::InvalidParameter`] for illegal bus geometry or a zero
    ///   depth.
    /// - [`BuildError::WidthExceeded`] when `depth` words are not addressable
    ///   with `params.addr_width` bits.
    pub fn new(params: BusParams, depth: usize, read_only: bool) -> Result<Self, BuildError> {
        params.validate()?;
        if depth == 0 {
            return Err(BuildError::invalid("depth", "at least 1", 0_u32));
        }
        let words = u64::try_from(depth).unwrap_or(u64::MAX);
        let addressable = 1_u64.checked_shl(params.addr_width).unwrap_or(u64::MAX);
        if words > addressable {
            return Err(BuildError::WidthExceeded {
                what: "memory depth".to_owned(),
                required: words,
                available: addressable,
            });
        }
        debug!(
            "sram: {depth} x {} bit words, granularity {}{}",
            params.data_width,
            params.granularity,
            if read_only { ", read-only" } else { "" }
        );
        Ok(Self {
            params,
            memory: vec![0; depth],
            read_only,
            ack: false,
        })
    }

    /// Number of words.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.memory.len()
    }

    /// Returns `true` when bus writes are ignored.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Copies `words` into memory starting at word `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::WidthExceeded`] when the image does not fit.
    pub fn load(&mut self, offset: usize, words: &[u64]) -> Result<(), BuildError> {
        let end = offset.checked_add(words.len()).filter(|end| *end <= self.memory.len());
        let Some(end) = end else {
            return Err(BuildError::WidthExceeded {
                what: "memory image".to_owned(),
                required: u64::try_from(offset.saturating_add(words.len())).unwrap_or(u64::MAX),
                available: u64::try_from(self.memory.len()).unwrap_or(u64::MAX),
            });
        };
        let data_mask = self.params.data_mask();
        for (slot, word) in self.memory[offset..end].iter_mut().zip(words) {
            *slot = word & data_mask;
        }
        Ok(())
    }

    /// Word stored at `addr`.
    #[must_use]
    pub fn word(&self, addr: usize) -> Option<u64> {
        self.memory.get(addr).copied()
    }

    fn index(&self, adr: u64) -> Option<usize> {
        usize::try_from(adr).ok().filter(|index| *index < self.memory.len())
    }
}

impl WishboneTarget for Sram {
    fn params(&self) -> BusParams {
        self.params
    }

    fn step(&mut self, request: &Request) -> Response {
        let index = self.index(request.adr);
        let response = Response {
            dat_r: index.map_or(0, |index| self.memory[index]),
            ack: self.ack,
            ..Response::default()
        };

        let accepted = request.is_active() && !self.ack;
        if accepted && request.we && !self.read_only {
            if let Some(index) = index {
                let granularity = self.params.granularity;
                let lane_mask = mask64(granularity);
                let mut word = self.memory[index];
                for lane in 0..self.params.lanes() {
                    if request.sel >> lane & 1 == 1 {
                        let bits = lane_mask << (lane * granularity);
                        word = (word & !bits) | (request.dat_w & bits);
                    }
                }
                trace!("sram: [{index:#x}] <- {word:#x}");
                self.memory[index] = word;
            }
        }
        self.ack = accepted;
        response
    }
}
