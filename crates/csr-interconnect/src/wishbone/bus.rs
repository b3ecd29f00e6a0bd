//! Wishbone interface description and per-cycle signal bundles.

use core::fmt;
use core::ops::BitOr;

use crate::bits::{ceil_log2, mask64};
use crate::error::BuildError;
use crate::router::{MapShape, Subordinate};

/// Set of optional Wishbone signals an interface carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Features(u8);

impl Features {
    /// No optional signals.
    pub const NONE: Self = Self(0);
    /// Error termination.
    pub const ERR: Self = Self(1 << 0);
    /// Retry termination.
    pub const RTY: Self = Self(1 << 1);
    /// Pipelined flow control.
    pub const STALL: Self = Self(1 << 2);
    /// Bus lock.
    pub const LOCK: Self = Self(1 << 3);
    /// Cycle type identifier.
    pub const CTI: Self = Self(1 << 4);
    /// Burst type extension.
    pub const BTE: Self = Self(1 << 5);
    /// Every optional signal.
    pub const ALL: Self = Self(0x3F);

    /// Signals driven by the target towards the initiator.
    pub const RESPONSE_SIGNALS: [(Self, &'static str); 3] =
        [(Self::ERR, "err"), (Self::RTY, "rty"), (Self::STALL, "stall")];

    /// Signals driven by the initiator towards the target.
    pub const REQUEST_SIGNALS: [(Self, &'static str); 3] =
        [(Self::LOCK, "lock"), (Self::CTI, "cti"), (Self::BTE, "bte")];

    /// Raw bit representation.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` when every signal of `other` is present.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Signals present in either set.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` when no signal is present.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Features {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Display for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in Self::RESPONSE_SIGNALS.iter().chain(&Self::REQUEST_SIGNALS) {
            if self.contains(*flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

/// Cycle type identifier (`CTI_O`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum CycleType {
    /// Single transfer.
    #[default]
    Classic = 0,
    /// Burst to a constant address.
    ConstBurst = 1,
    /// Burst to incrementing addresses.
    IncrBurst = 2,
    /// Last beat of a burst.
    EndOfBurst = 7,
}

/// Burst type extension (`BTE_O`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum BurstTypeExt {
    /// Linear burst.
    #[default]
    Linear = 0,
    /// Four-beat wrapping burst.
    Wrap4 = 1,
    /// Eight-beat wrapping burst.
    Wrap8 = 2,
    /// Sixteen-beat wrapping burst.
    Wrap16 = 3,
}

const LEGAL_WIDTHS: [u32; 4] = [8, 16, 32, 64];

/// Static description of one Wishbone interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BusParams {
    /// Word address bits.
    pub addr_width: u32,
    /// Data width in bits: 8, 16, 32 or 64.
    pub data_width: u32,
    /// Bits per select lane: 8, 16, 32 or 64, at most `data_width`.
    pub granularity: u32,
    /// Optional signals carried by the interface.
    pub features: Features,
}

impl Default for BusParams {
    fn default() -> Self {
        Self {
            addr_width: 30,
            data_width: 32,
            granularity: 8,
            features: Features::NONE,
        }
    }
}

impl BusParams {
    /// Word-addressed interface without optional signals.
    #[must_use]
    pub const fn new(addr_width: u32, data_width: u32) -> Self {
        Self {
            addr_width,
            data_width,
            granularity: data_width,
            features: Features::NONE,
        }
    }

    /// Replaces the select-lane granularity.
    #[must_use]
    pub const fn with_granularity(mut self, granularity: u32) -> Self {
        self.granularity = granularity;
        self
    }

    /// Replaces the optional signal set.
    #[must_use]
    pub const fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    /// Checks widths against the Wishbone rules.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidParameter`] for an illegal data width or
    /// granularity, or an address space that does not fit in 64 bits.
    pub fn validate(&self) -> Result<(), BuildError> {
        if !LEGAL_WIDTHS.contains(&self.data_width) {
            return Err(BuildError::invalid("data_width", "one of 8, 16, 32, 64", self.data_width));
        }
        if !LEGAL_WIDTHS.contains(&self.granularity) || self.granularity > self.data_width {
            return Err(BuildError::invalid(
                "granularity",
                "one of 8, 16, 32, 64 and at most the data width",
                self.granularity,
            ));
        }
        if self.shape().map_addr_width() > 63 {
            return Err(BuildError::invalid(
                "addr_width",
                "small enough for a 64-bit byte space",
                self.addr_width,
            ));
        }
        Ok(())
    }

    /// Number of select lanes.
    #[must_use]
    pub const fn lanes(&self) -> u32 {
        if self.granularity == 0 {
            1
        } else {
            self.data_width / self.granularity
        }
    }

    /// `log2` of the number of select lanes.
    #[must_use]
    pub const fn lane_bits(&self) -> u32 {
        ceil_log2(self.lanes() as u64)
    }

    /// Mask covering every select lane.
    #[must_use]
    pub const fn sel_mask(&self) -> u64 {
        mask64(self.lanes())
    }

    /// Mask covering the data bus.
    #[must_use]
    pub const fn data_mask(&self) -> u64 {
        mask64(self.data_width)
    }

    /// Returns `true` when the interface carries `feature`.
    #[must_use]
    pub const fn has(&self, feature: Features) -> bool {
        self.features.contains(feature)
    }

    /// Router geometry of this interface.
    #[must_use]
    pub const fn shape(&self) -> MapShape {
        MapShape {
            addr_width: self.addr_width,
            data_width: self.data_width,
            granularity: self.granularity,
            features: self.features,
        }
    }
}

/// Initiator-driven signals for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Request {
    /// Word address.
    pub adr: u64,
    /// Write data.
    pub dat_w: u64,
    /// Lane select.
    pub sel: u64,
    /// Bus cycle in progress.
    pub cyc: bool,
    /// Transfer strobe.
    pub stb: bool,
    /// Write enable.
    pub we: bool,
    /// Bus lock.
    pub lock: bool,
    /// Cycle type identifier.
    pub cti: CycleType,
    /// Burst type extension.
    pub bte: BurstTypeExt,
}

impl Request {
    /// Single read of the lanes in `sel`.
    #[must_use]
    pub fn read(adr: u64, sel: u64) -> Self {
        Self {
            adr,
            sel,
            cyc: true,
            stb: true,
            ..Self::default()
        }
    }

    /// Single write of the lanes in `sel`.
    #[must_use]
    pub fn write(adr: u64, dat_w: u64, sel: u64) -> Self {
        Self {
            adr,
            dat_w,
            sel,
            cyc: true,
            stb: true,
            we: true,
            ..Self::default()
        }
    }

    /// Returns `true` when a transfer is being requested this cycle.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.cyc && self.stb
    }
}

/// Target-driven signals for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Response {
    /// Read data.
    pub dat_r: u64,
    /// Normal termination.
    pub ack: bool,
    /// Error termination.
    pub err: bool,
    /// Retry termination.
    pub rty: bool,
    /// Target cannot accept a new transfer.
    pub stall: bool,
}

impl Response {
    /// Returns `true` when the transfer ended this cycle.
    #[must_use]
    pub const fn terminated(&self) -> bool {
        self.ack || self.err || self.rty
    }
}

/// A Wishbone target driven one clock cycle at a time.
pub trait WishboneTarget {
    /// Interface description.
    fn params(&self) -> BusParams;

    /// Presents `request` for one cycle, returns this cycle's response and
    /// advances to the next clock edge.
    fn step(&mut self, request: &Request) -> Response;
}

impl<T: WishboneTarget + ?Sized> WishboneTarget for Box<T> {
    fn params(&self) -> BusParams {
        (**self).params()
    }

    fn step(&mut self, request: &Request) -> Response {
        (**self).step(request)
    }
}

impl Subordinate for Box<dyn WishboneTarget> {
    fn shape(&self) -> MapShape {
        self.params().shape()
    }
}

/// Replicates every lane bit of `sel` `ratio` times.
pub(crate) const fn widen_sel(sel: u64, lanes: u32, ratio: u32) -> u64 {
    let mut widened = 0;
    let mut lane = 0;
    while lane < lanes {
        if sel >> lane & 1 == 1 {
            widened |= mask64(ratio) << (lane * ratio);
        }
        lane += 1;
    }
    widened
}

#[cfg(test)]
mod tests {
    use super::{widen_sel, BusParams, CycleType, Features, Request};
    use crate::error::ErrorKind;
    use rstest::rstest;

    #[rstest]
    #[case(BusParams::new(30, 12), ErrorKind::InvalidParameter)]
    #[case(BusParams::new(30, 32).with_granularity(64), ErrorKind::InvalidParameter)]
    #[case(BusParams::new(30, 32).with_granularity(4), ErrorKind::InvalidParameter)]
    #[case(BusParams::new(62, 32).with_granularity(8), ErrorKind::InvalidParameter)]
    fn rejects_illegal_geometry(#[case] params: BusParams, #[case] kind: ErrorKind) {
        assert_eq!(params.validate().map_err(|err| err.kind()), Err(kind));
    }

    #[test]
    fn default_interface_is_byte_granular() {
        let params = BusParams::default();
        params.validate().expect("default is legal");
        assert_eq!(params.lanes(), 4);
        assert_eq!(params.lane_bits(), 2);
        assert_eq!(params.sel_mask(), 0b1111);
        assert_eq!(params.shape().map_addr_width(), 32);
    }

    #[test]
    fn feature_set_operations() {
        let set = Features::ERR | Features::STALL;
        assert!(set.contains(Features::ERR));
        assert!(!set.contains(Features::LOCK));
        assert!(Features::ALL.contains(set));
        assert_eq!(set.to_string(), "err|stall");
        assert_eq!(Features::NONE.to_string(), "none");
    }

    #[test]
    fn request_helpers_raise_cyc_and_stb() {
        let request = Request::write(3, 0xAB, 0b1);
        assert!(request.is_active() && request.we);
        assert_eq!(request.cti, CycleType::Classic);
        assert!(!Request::read(3, 0b1).we);
        assert_eq!(CycleType::EndOfBurst as u8, 7);
    }

    #[test]
    fn select_widening() {
        assert_eq!(widen_sel(0b10, 2, 2), 0b1100);
        assert_eq!(widen_sel(0b11, 2, 2), 0b1111);
        assert_eq!(widen_sel(0b1, 4, 1), 0b1);
    }
}
