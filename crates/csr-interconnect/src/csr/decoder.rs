//! Routing one CSR bus to several CSR targets.

use crate::csr::bus::fan_out;
use crate::csr::{BusParams, CsrTarget, Request, Response};
use crate::error::BuildError;
use crate::router::{AddressRangeRouter, AddressWindow};

/// Decodes a CSR bus onto subordinate CSR buses, typically one per bank.
#[derive(Debug)]
pub struct Decoder {
    params: BusParams,
    router: AddressRangeRouter<Box<dyn CsrTarget>>,
    read_select: Option<usize>,
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
            read_select: None,
        })
    }

    /// Places a subordinate bus.
    ///
    /// # Errors
    ///
    /// See [`AddressRangeRouter::add`]; the subordinate must have the same
    /// data width as the decoder.
    pub fn add(
        &mut self,
        sub: Box<dyn CsrTarget>,
        at: Option<u64>,
    ) -> Result<AddressWindow, BuildError> {
        self.router.add(sub, at, false)
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
    pub fn subordinate_mut(&mut self, index: usize) -> Option<&mut dyn CsrTarget> {
        self.router.get_mut(index).map(|(_, sub)| &mut **sub as &mut dyn CsrTarget)
    }
}

impl CsrTarget for Decoder {
    fn params(&self) -> BusParams {
        self.params
    }

    fn step(&mut self, request: &Request) -> Response {
        fan_out(&mut self.router, &mut self.read_select, request)
    }
}

#[cfg(test)]
mod tests {
    use super::Decoder;
    use crate::csr::{
        Access, Bank, BankConfig, BusParams, CsrTarget, Field, RegisterBuilder, Request,
    };
    use crate::error::ErrorKind;

    fn bank(name: &str, addr_width: u32, reset: u128) -> Box<dyn CsrTarget> {
        let mut bank = Bank::new(
            name,
            BankConfig {
                bus: BusParams::new(addr_width, 8),
                alignment: 0,
            },
        )
        .expect("legal bus");
        let register = RegisterBuilder::new("id", Access::R)
            .field(Field::new("id").with_width(8).with_reset(reset))
            .and_then(RegisterBuilder::build)
            .expect("valid layout");
        bank.add(register, None).expect("fits");
        Box::new(bank)
    }

    #[test]
    fn places_and_aligns_subordinate_buses() {
        let mut decoder = Decoder::new("csr", BusParams::new(16, 8), 0).expect("legal bus");
        let window = decoder.add(bank("a", 10, 0xa), None).expect("fits");
        assert_eq!((window.start, window.end, window.ratio), (0, 0x400, 1));
        assert_eq!(decoder.align_to(12), 0x1000);
        let window = decoder.add(bank("b", 4, 0xb), None).expect("fits");
        assert_eq!((window.start, window.end), (0x1000, 0x1010));
        assert_eq!(decoder.windows().count(), 2);
    }

    #[test]
    fn routes_reads_to_nested_banks() {
        let mut decoder = Decoder::new("csr", BusParams::new(16, 8), 0).expect("legal bus");
        decoder.add(bank("a", 4, 0xa), None).expect("fits");
        decoder.add(bank("b", 4, 0xb), None).expect("fits");
        decoder.step(&Request::read(0x10));
        assert_eq!(decoder.step(&Request::read(0x00)).r_data, 0xb);
        assert_eq!(decoder.step(&Request::idle()).r_data, 0xa);
        assert!(decoder.subordinate_mut(1).is_some());
    }

    #[test]
    fn rejects_wider_subordinate_bus() {
        let mut decoder = Decoder::new("csr", BusParams::new(16, 16), 0).expect("legal bus");
        let err = decoder.add(bank("a", 4, 0), None).expect_err("8-bit bank on 16-bit bus");
        assert_eq!(err.kind(), ErrorKind::AccessViolation);
    }
}
