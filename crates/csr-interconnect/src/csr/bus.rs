//! CSR bus signal bundles and the target contract.

use core::fmt;

use crate::error::BuildError;
use crate::router::{AddressRangeRouter, MapShape, Subordinate};

/// Static description of a CSR bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BusParams {
    /// Address bits, in data-width words.
    pub addr_width: u32,
    /// Data width in bits.
    pub data_width: u32,
}

impl Default for BusParams {
    fn default() -> Self {
        Self {
            addr_width: 16,
            data_width: 8,
        }
    }
}

impl BusParams {
    /// Creates bus parameters.
    #[must_use]
    pub const fn new(addr_width: u32, data_width: u32) -> Self {
        Self {
            addr_width,
            data_width,
        }
    }

    /// Checks that both widths are usable.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidParameter`] when the data width is not in
    /// `1..=64` or the address width is not in `0..=63`.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.data_width == 0 || self.data_width > 64 {
            return Err(BuildError::invalid("data_width", "between 1 and 64", self.data_width));
        }
        if self.addr_width > 63 {
            return Err(BuildError::invalid("addr_width", "at most 63", self.addr_width));
        }
        Ok(())
    }

    /// Router geometry of this bus.
    #[must_use]
    pub const fn shape(&self) -> MapShape {
        MapShape::word_addressed(self.addr_width, self.data_width)
    }
}

/// Initiator-driven CSR signals for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Request {
    /// Word address.
    pub addr: u64,
    /// Read strobe.
    pub r_stb: bool,
    /// Write strobe.
    pub w_stb: bool,
    /// Write data.
    pub w_data: u64,
}

impl Request {
    /// Read strobe at `addr`.
    #[must_use]
    pub const fn read(addr: u64) -> Self {
        Self {
            addr,
            r_stb: true,
            w_stb: false,
            w_data: 0,
        }
    }

    /// Write strobe at `addr`.
    #[must_use]
    pub const fn write(addr: u64, w_data: u64) -> Self {
        Self {
            addr,
            r_stb: false,
            w_stb: true,
            w_data,
        }
    }

    /// No strobe.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            addr: 0,
            r_stb: false,
            w_stb: false,
            w_data: 0,
        }
    }
}

/// Target-driven CSR signals for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Response {
    /// Data for the read strobed on the previous cycle, else 0.
    pub r_data: u64,
}

/// A CSR target driven one clock cycle at a time.
///
/// Read data is registered: the response to a read strobe arrives with the
/// next call to [`CsrTarget::step`].
pub trait CsrTarget {
    /// Bus description.
    fn params(&self) -> BusParams;

    /// Presents `request` for one cycle, returns this cycle's response and
    /// advances to the next clock edge.
    fn step(&mut self, request: &Request) -> Response;
}

impl<T: CsrTarget + ?Sized> CsrTarget for Box<T> {
    fn params(&self) -> BusParams {
        (**self).params()
    }

    fn step(&mut self, request: &Request) -> Response {
        (**self).step(request)
    }
}

impl fmt::Debug for dyn CsrTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrTarget").field("params", &self.params()).finish()
    }
}

impl Subordinate for Box<dyn CsrTarget> {
    fn shape(&self) -> MapShape {
        self.params().shape()
    }
}

/// Steps every subordinate of a CSR router for one cycle.
///
/// The addressed subordinate sees the strobes; every other one is idled.
/// Read data is steered by `read_select`, the subordinate read on the
/// previous cycle, which is then updated for the next one.
pub(crate) fn fan_out<S: CsrTarget>(
    router: &mut AddressRangeRouter<S>,
    read_select: &mut Option<usize>,
    request: &Request,
) -> Response {
    let hit = router.route(request.addr);
    let mut response = Response::default();
    for (index, (_, sub)) in router.iter_mut().enumerate() {
        let sub_request = match hit {
            Some((selected, local)) if selected == index => Request {
                addr: local,
                ..*request
            },
            _ => Request::idle(),
        };
        let sub_response = sub.step(&sub_request);
        if *read_select == Some(index) {
            response = sub_response;
        }
    }
    *read_select = hit.filter(|_| request.r_stb).map(|(index, _)| index);
    response
}
