//! Round-robin sharing of one Wishbone target between several initiators.

use log::debug;

use crate::error::BuildError;
use crate::scheduler::RoundRobin;
use crate::wishbone::bus::widen_sel;
use crate::wishbone::{
    BurstTypeExt, BusParams, CycleType, Decoder, Features, Request, Response, WishboneTarget,
};

/// Several initiators sharing one decoder and every target behind it.
pub type SharedInterconnect = Arbiter<Decoder>;

/// Multiplexes initiator buses onto one target.
///
/// The granted initiator's request is forwarded to the target and only that
/// initiator sees `ack`, `err` and `rty`. Read data is broadcast. The grant
/// moves only while the target bus is idle, so a transfer or a locked
/// sequence is never interleaved with another initiator's.
#[derive(Debug)]
pub struct Arbiter<T> {
    params: BusParams,
    target: T,
    initiators: Vec<BusParams>,
    scheduler: RoundRobin,
}

impl<T: WishboneTarget> Arbiter<T> {
    /// Creates an arbiter with no initiators in front of `target`.
    ///
    /// # Errors
    ///
    /// See [`BusParams::validate`].
    pub fn new(target: T) -> Result<Self, BuildError> {
        let params = target.params();
        params.validate()?;
        Ok(Self {
            params,
            target,
            initiators: Vec::new(),
            scheduler: RoundRobin::new(0)?,
        })
    }

    /// Attaches an initiator bus and returns its index.
    ///
    /// # Errors
    ///
    /// - [`BuildError::InvalidParameter`] for illegal geometry or when
    ///   [`MAX_REQUESTERS`](crate::scheduler::MAX_REQUESTERS) initiators are already attached.
    /// - [`BuildError::AccessViolation`] when address or data widths differ,
    ///   or the initiator's granularity is finer than the target's.
    /// - [`BuildError::CapabilityMismatch`] when the initiator drives `lock`,
    ///   `cti` or `bte` and the target bus does not carry it.
    pub fn add(&mut self, initiator: BusParams) -> Result<usize, BuildError> {
        initiator.validate()?;
        let index = self.initiators.len();
        let what = format!("initiator #{index}");
        if initiator.addr_width != self.params.addr_width {
            return Err(BuildError::access(
                what,
                format!(
                    "address width {} differs from arbiter address width {}",
                    initiator.addr_width, self.params.addr_width
                ),
            ));
        }
        if initiator.data_width != self.params.data_width {
            return Err(BuildError::access(
                what,
                format!(
                    "data width {} differs from arbiter data width {}",
                    initiator.data_width, self.params.data_width
                ),
            ));
        }
        if initiator.granularity < self.params.granularity {
            return Err(BuildError::access(
                what,
                format!(
                    "granularity {} is finer than arbiter granularity {}",
                    initiator.granularity, self.params.granularity
                ),
            ));
        }
        for (flag, signal) in Features::REQUEST_SIGNALS {
            if initiator.has(flag) && !self.params.has(flag) {
                return Err(BuildError::CapabilityMismatch {
                    what,
                    signal,
                    host: "arbiter".to_owned(),
                });
            }
        }
        self.scheduler = RoundRobin::new(index + 1)?;
        self.initiators.push(initiator);
        debug!(
            "arbiter: initiator #{index} attached ({} bit granularity, {})",
            initiator.granularity, initiator.features
        );
        Ok(index)
    }

    /// Bus description shared with the target.
    #[must_use]
    pub const fn params(&self) -> BusParams {
        self.params
    }

    /// Attached initiator buses.
    #[must_use]
    pub fn initiators(&self) -> &[BusParams] {
        &self.initiators
    }

    /// Index of the initiator currently granted.
    #[must_use]
    pub const fn grant(&self) -> usize {
        self.scheduler.grant()
    }

    /// The shared target.
    #[must_use]
    pub const fn target(&self) -> &T {
        &self.target
    }

    /// Mutable access to the shared target.
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    fn lock_of(&self, index: usize, request: &Request) -> bool {
        self.initiators.get(index).is_some_and(|init| !init.has(Features::LOCK) || request.lock)
    }

    fn requesting(&self, index: usize, request: &Request) -> bool {
        request.cyc
            && (!self.params.has(Features::LOCK) || self.lock_of(index, request) || request.stb)
    }

    fn forward(&self, grant: usize, request: &Request) -> Request {
        let Some(init) = self.initiators.get(grant) else {
            return Request::default();
        };
        let ratio = init.granularity / self.params.granularity;
        let both = |feature| init.has(feature) && self.params.has(feature);
        Request {
            adr: request.adr,
            dat_w: request.dat_w,
            sel: widen_sel(request.sel, init.lanes(), ratio),
            cyc: request.cyc,
            stb: request.stb,
            we: request.we,
            lock: self.params.has(Features::LOCK) && self.lock_of(grant, request),
            cti: if both(Features::CTI) {
                request.cti
            } else {
                CycleType::Classic
            },
            bte: if both(Features::BTE) {
                request.bte
            } else {
                BurstTypeExt::Linear
            },
        }
    }

    /// Clocks the arbiter and its target for one cycle.
    ///
    /// `requests[i]` is driven by initiator `i`; missing entries are idle.
    /// Returns one response per attached initiator.
    pub fn step(&mut self, requests: &[Request]) -> Vec<Response> {
        let idle = Request::default();
        let request_of = |index: usize| requests.get(index).unwrap_or(&idle);

        let grant = self.scheduler.grant();
        let target_request = self.forward(grant, request_of(grant));
        let target_response = self.target.step(&target_request);

        let responses = self
            .initiators
            .iter()
            .enumerate()
            .map(|(index, init)| {
                let granted = index == grant;
                let both = |feature| init.has(feature) && self.params.has(feature);
                Response {
                    dat_r: target_response.dat_r,
                    ack: granted && target_response.ack,
                    err: granted && both(Features::ERR) && target_response.err,
                    rty: granted && both(Features::RTY) && target_response.rty,
                    stall: init.has(Features::STALL)
                        && (!granted
                            || if self.params.has(Features::STALL) {
                                target_response.stall
                            } else {
                                !target_response.ack
                            }),
                }
            })
            .collect();

        let pending = (0..self.initiators.len())
            .filter(|&index| self.requesting(index, request_of(index)))
            .fold(0_u64, |bits, index| bits | (1 << index));
        let busy = target_request.cyc
            && (!self.params.has(Features::LOCK) || target_request.lock || target_request.stb);
        self.scheduler.step(pending, !busy);
        responses
    }
}
