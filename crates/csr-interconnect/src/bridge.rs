//! Wishbone front-end for a CSR bus.

use log::{debug, trace};

use crate::bits::{ceil_log2, mask64};
use crate::csr::{self, CsrTarget};
use crate::error::BuildError;
use crate::wishbone::{self, BusParams, Features, WishboneTarget};

const LEGAL_WIDTHS: [u32; 4] = [8, 16, 32, 64];

/// Exposes a CSR bus as a Wishbone target of equal or larger data width.
///
/// The Wishbone granularity equals the CSR data width, so every select lane
/// maps to one CSR address. A transfer walks the lanes in order, one CSR
/// cycle each, and is acknowledged on the following cycle. Every transfer
/// therefore takes `lanes + 1` cycles whatever `sel` holds. Write side
/// effects reach the CSR bus lane by lane during the walk.
///
/// The internal lane counter only returns to zero once `cyc & stb` drops, so
/// an initiator must release the strobe between transfers.
#[derive(Debug)]
pub struct WishboneCsrBridge<T> {
    csr: T,
    params: BusParams,
    lanes: u32,
    counter: u32,
    dat_r: u64,
}

impl<T: CsrTarget> WishboneCsrBridge<T> {
    /// Wraps `csr` behind a Wishbone interface of `data_width` bits, or of
    /// the CSR data width when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidParameter`] when the CSR data width is
    /// not 8, 16, 32 or 64, or when `data_width` is not one of those or not
    /// a multiple of the CSR data width.
    pub fn new(csr: T, data_width: Option<u32>) -> Result<Self, BuildError> {
        let csr_params = csr.params();
        if !LEGAL_WIDTHS.contains(&csr_params.data_width) {
            return Err(BuildError::invalid(
                "CSR data width",
                "one of 8, 16, 32, 64",
                csr_params.data_width,
            ));
        }
        let data_width = data_width.unwrap_or(csr_params.data_width);
        if !LEGAL_WIDTHS.contains(&data_width) || data_width < csr_params.data_width {
            return Err(BuildError::invalid(
                "Wishbone data width",
                "one of 8, 16, 32, 64 and at least the CSR data width",
                data_width,
            ));
        }
        let lanes = data_width / csr_params.data_width;
        let params = BusParams {
            addr_width: csr_params.addr_width.saturating_sub(ceil_log2(u64::from(lanes))),
            data_width,
            granularity: csr_params.data_width,
            features: Features::NONE,
        };
        params.validate()?;
        debug!(
            "csr bridge: {} bit wishbone over {} bit csr, {lanes} lanes, {} address bits",
            data_width, csr_params.data_width, params.addr_width
        );
        Ok(Self {
            csr,
            params,
            lanes,
            counter: 0,
            dat_r: 0,
        })
    }

    /// The CSR target behind the bridge.
    #[must_use]
    pub const fn csr(&self) -> &T {
        &self.csr
    }

    /// Mutable access to the CSR target.
    pub fn csr_mut(&mut self) -> &mut T {
        &mut self.csr
    }

    /// Number of CSR cycles per Wishbone transfer, excluding the acknowledge.
    #[must_use]
    pub const fn lanes(&self) -> u32 {
        self.lanes
    }
}

impl<T: CsrTarget> WishboneTarget for WishboneCsrBridge<T> {
    fn params(&self) -> BusParams {
        self.params
    }

    fn step(&mut self, request: &wishbone::Request) -> wishbone::Response {
        let granularity = self.params.granularity;
        let lane_mask = mask64(granularity);
        let active = request.is_active();
        let state = self.counter;

        let mut csr_request = csr::Request::idle();
        let mut ack = false;
        if !active {
            self.counter = 0;
        } else if state < self.lanes {
            let selected = request.sel >> state & 1 == 1;
            let addr = (request.adr << self.params.lane_bits()) | u64::from(state);
            csr_request = csr::Request {
                addr: addr & mask64(self.csr.params().addr_width),
                r_stb: selected && !request.we,
                w_stb: selected && request.we,
                w_data: (request.dat_w >> (state * granularity)) & lane_mask,
            };
            self.counter = state + 1;
        } else if state == self.lanes {
            ack = true;
            self.counter = state + 1;
        }

        let csr_response = self.csr.step(&csr_request);
        if active && (1..=self.lanes).contains(&state) {
            let shift = (state - 1) * granularity;
            let bits = lane_mask << shift;
            self.dat_r = (self.dat_r & !bits) | ((csr_response.r_data << shift) & bits);
        }
        if ack {
            trace!(
                "csr bridge: ack {} at {:#x}, data {:#x}",
                if request.we { "write" } else { "read" },
                request.adr,
                self.dat_r
            );
        }
        wishbone::Response {
            dat_r: self.dat_r,
            ack,
            ..wishbone::Response::default()
        }
    }
}
