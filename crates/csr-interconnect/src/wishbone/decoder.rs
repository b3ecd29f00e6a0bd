//! Wishbone address decoder.

use core::fmt;

use crate::bits::mask64;
use crate::error::BuildError;
use crate::router::{AddressRangeRouter, AddressWindow};
use crate::wishbone::bus::widen_sel;
use crate::wishbone::{
    BurstTypeExt, BusParams, CycleType, Features, Request, Response, WishboneTarget,
};

impl fmt::Debug for dyn WishboneTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WishboneTarget").field("params", &self.params()).finish()
    }
}

/// Routes one Wishbone bus to several subordinate buses by address.
///
/// Windows are expressed in granularity units of the decoder bus, so an
/// incoming word address is first scaled by the number of select lanes.
#[derive(Debug)]
pub struct Decoder {
    params: BusParams,
    router: AddressRangeRouter<Box<dyn WishboneTarget>>,
}

impl Decoder {
    /// Creates an empty decoder.
    ///
    /// # Errors
    ///
    /// See [`BusParams::validate`].
    pub fn new(
        name: impl Into<String>,
        params: BusParams,
        alignment: u32,
    ) -> Result<Self, BuildError> {
        params.validate()?;
        Ok(Self {
            params,
            router: AddressRangeRouter::new(name, params.shape(), alignment),
        })
    }

    /// Places a subordinate bus.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidParameter`] for illegal subordinate
    /// geometry, and otherwise the errors of [`AddressRangeRouter::add`].
    pub fn add(
        &mut self,
        sub: Box<dyn WishboneTarget>,
        at: Option<u64>,
        sparse: bool,
    ) -> Result<AddressWindow, BuildError> {
        sub.params().validate()?;
        self.router.add(sub, at, sparse)
    }

    /// Rounds the next implicit placement up to a `1 << alignment` boundary.
    pub fn align_to(&mut self, alignment: u32) -> u64 {
        self.router.align_to(alignment)
    }

    /// Windows in placement order.
    pub fn windows(&self) -> impl Iterator<Item = AddressWindow> + '_ {
        self.router.windows()
    }

    /// Subordinate at `index`.
    #[must_use]
    pub fn subordinate(&self, index: usize) -> Option<&dyn WishboneTarget> {
        self.router.get(index).map(|(_, sub)| &**sub)
    }

    /// Mutable subordinate at `index`.
    pub fn subordinate_mut(&mut self, index: usize) -> Option<&mut dyn WishboneTarget> {
        self.router.get_mut(index).map(|(_, sub)| &mut **sub as &mut dyn WishboneTarget)
    }

    fn translate(
        &self,
        request: &Request,
        units: u64,
        window: AddressWindow,
        sub: BusParams,
    ) -> Request {
        let parent = self.params;
        let offset = units.saturating_sub(window.start);
        let (adr, sel, dat_w) = if sub.data_width == parent.data_width {
            let ratio = u32::try_from(window.ratio).unwrap_or(1);
            let local_units = offset.saturating_mul(window.ratio);
            (
                local_units >> sub.lane_bits(),
                widen_sel(request.sel, parent.lanes(), ratio),
                request.dat_w,
            )
        } else {
            (
                offset >> parent.lane_bits(),
                request.sel & sub.sel_mask(),
                request.dat_w & sub.data_mask(),
            )
        };
        let both = |feature| parent.has(feature) && sub.has(feature);
        Request {
            adr: adr & mask64(sub.addr_width),
            dat_w,
            sel,
            cyc: false,
            stb: request.stb,
            we: request.we,
            lock: both(Features::LOCK) && request.lock,
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
}

impl WishboneTarget for Decoder {
    fn params(&self) -> BusParams {
        self.params
    }

    fn step(&mut self, request: &Request) -> Response {
        let units = request.adr << self.params.lane_bits();
        let hit = self.router.route(units).map(|(index, _)| index);

        let requests: Vec<Request> = self
            .router
            .iter()
            .enumerate()
            .map(|(index, (window, sub))| Request {
                cyc: request.cyc && hit == Some(index),
                ..self.translate(request, units, window, sub.params())
            })
            .collect();

        let parent = self.params;
        let mut response = Response::default();
        for (index, ((_, sub), sub_request)) in self.router.iter_mut().zip(&requests).enumerate() {
            let sub_params = sub.params();
            let sub_response = sub.step(sub_request);
            if hit != Some(index) {
                continue;
            }
            let both = |feature| parent.has(feature) && sub_params.has(feature);
            response = Response {
                dat_r: sub_response.dat_r & sub_params.data_mask(),
                ack: sub_response.ack,
                err: both(Features::ERR) && sub_response.err,
                rty: both(Features::RTY) && sub_response.rty,
                stall: parent.has(Features::STALL)
                    && if sub_params.has(Features::STALL) {
                        sub_response.stall
                    } else {
                        request.cyc && !sub_response.ack
                    },
            };
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::Decoder;
    use crate::error::ErrorKind;
    use crate::wishbone::{
        BurstTypeExt, BusParams, CycleType, Features, Request, Response, WishboneTarget,
    };

    /// Acknowledges immediately and answers each selected lane with the
    /// address plus the lane index.
    struct Loopback {
        params: BusParams,
    }

    impl Loopback {
        fn boxed(params: BusParams) -> Box<dyn WishboneTarget> {
            Box::new(Self { params })
        }
    }

    impl WishboneTarget for Loopback {
        fn params(&self) -> BusParams {
            self.params
        }

        fn step(&mut self, request: &Request) -> Response {
            let mut dat_r = 0;
            for lane in 0..self.params.lanes() {
                if request.sel >> lane & 1 == 1 {
                    let value =
                        (request.adr + u64::from(lane)) & ((1 << self.params.granularity) - 1);
                    dat_r |= value << (lane * self.params.granularity);
                }
            }
            Response {
                dat_r,
                ack: request.cyc && request.stb,
                err: request.cyc && request.stb && request.we,
                ..Response::default()
            }
        }
    }

    /// Remembers the last request it was given.
    struct Recorder {
        params: BusParams,
        seen: Rc<Cell<Request>>,
    }

    impl WishboneTarget for Recorder {
        fn params(&self) -> BusParams {
            self.params
        }

        fn step(&mut self, request: &Request) -> Response {
            self.seen.set(*request);
            Response::default()
        }
    }

    fn decoder() -> Decoder {
        let params = BusParams::new(31, 32).with_granularity(16);
        Decoder::new("wb", params, 0).expect("legal bus")
    }

    #[test]
    fn implicit_placement_and_alignment() {
        let mut decoder = decoder();
        let sub = BusParams::new(15, 32).with_granularity(16);
        let window = decoder.add(Loopback::boxed(sub), None, false).expect("fits");
        assert_eq!((window.start, window.end, window.ratio), (0, 0x1_0000, 1));
        assert_eq!(decoder.align_to(18), 0x4_0000);
        let window = decoder.add(Loopback::boxed(sub), None, false).expect("fits");
        assert_eq!((window.start, window.end, window.ratio), (0x4_0000, 0x5_0000, 1));
    }

    #[test]
    fn dense_subordinate_with_finer_granularity() {
        let mut decoder = decoder();
        let sub = BusParams::new(6, 32).with_granularity(8);
        decoder.add(Loopback::boxed(sub), Some(0x2_0000), false).expect("fits");
        let response = decoder.step(&Request::read(0x2_0010 >> 1, 0b11));
        assert!(response.ack);
        assert_eq!(response.dat_r, 0x0b0a_0908);
        let response = decoder.step(&Request::read(0x2_0010 >> 1, 0b10));
        assert_eq!(response.dat_r, 0x0b0a_0000);
    }

    #[test]
    fn sparse_subordinate_uses_low_lanes() {
        let mut decoder = decoder();
        let sub = BusParams::new(8, 16);
        decoder.add(Loopback::boxed(sub), Some(0x3_0000), true).expect("fits");
        assert_eq!(decoder.step(&Request::read(0x3_0010 >> 1, 0b11)).dat_r, 0x0008);
        assert_eq!(decoder.step(&Request::read(0x3_0012 >> 1, 0b11)).dat_r, 0x0009);
        assert_eq!(decoder.step(&Request::read(0x3_0012 >> 1, 0b10)).dat_r, 0);
    }

    #[test]
    fn unmatched_address_selects_nobody() {
        let mut decoder = decoder();
        let sub = Loopback::boxed(BusParams::new(4, 32).with_granularity(16));
        decoder.add(sub, None, false).expect("fits");
        let response = decoder.step(&Request::read(0x100, 0b11));
        assert_eq!(response, Response::default());
    }

    #[test]
    fn optional_signals_need_both_sides() {
        let params = BusParams::new(31, 32).with_granularity(16).with_features(Features::ERR);
        let mut decoder = Decoder::new("wb", params, 0).expect("legal bus");
        let plain = BusParams::new(4, 32).with_granularity(16);
        let with_err = plain.with_features(Features::ERR);
        decoder.add(Loopback::boxed(plain), None, false).expect("fits");
        decoder.add(Loopback::boxed(with_err), None, false).expect("fits");
        assert!(!decoder.step(&Request::write(0, 0, 0b11)).err);
        assert!(decoder.step(&Request::write(0x10, 0, 0b11)).err);

        let with_rty = plain.with_features(Features::RTY);
        let err = decoder.add(Loopback::boxed(with_rty), None, false).expect_err("rty unsupported");
        assert_eq!(err.kind(), ErrorKind::CapabilityMismatch);
    }

    #[test]
    fn illegal_subordinate_geometry_is_rejected() {
        let mut decoder = decoder();
        let sub = Loopback::boxed(BusParams::new(4, 24));
        let err = decoder.add(sub, None, false).expect_err("24-bit bus");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn burst_and_lock_signals_need_both_sides() {
        let bursts = Features::LOCK | Features::CTI | Features::BTE;
        let params = BusParams::new(31, 32).with_granularity(16).with_features(bursts);
        let mut decoder = Decoder::new("wb", params, 0).expect("legal bus");
        let plain = Rc::new(Cell::new(Request::default()));
        let capable = Rc::new(Cell::new(Request::default()));
        let sub = BusParams::new(4, 32).with_granularity(16);
        let recorder = |params, seen: &Rc<Cell<Request>>| {
            Box::new(Recorder {
                params,
                seen: Rc::clone(seen),
            })
        };
        decoder.add(recorder(sub, &plain), None, false).expect("fits");
        decoder
            .add(recorder(sub.with_features(bursts), &capable), None, false)
            .expect("fits");

        let burst = Request {
            lock: true,
            cti: CycleType::IncrBurst,
            bte: BurstTypeExt::Wrap4,
            ..Request::read(0, 0b11)
        };
        decoder.step(&burst);
        let seen = plain.get();
        assert!(seen.cyc);
        assert!(!seen.lock);
        assert_eq!(seen.cti, CycleType::Classic);
        assert_eq!(seen.bte, BurstTypeExt::Linear);

        decoder.step(&Request { adr: 0x10, ..burst });
        let seen = capable.get();
        assert!(seen.cyc && seen.lock);
        assert_eq!(seen.cti, CycleType::IncrBurst);
        assert_eq!(seen.bte, BurstTypeExt::Wrap4);
    }
}
