//! A named set of registers sharing one CSR bus.

use log::{debug, trace};

use crate::csr::bus::fan_out;
use crate::csr::{BusParams, ChunkedAccessMux, CsrTarget, Register, Request, Response};
use crate::error::BuildError;
use crate::router::{AddressRangeRouter, AddressWindow};

/// Construction parameters of a [`Bank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BankConfig {
    /// Bus the bank is attached to.
    pub bus: BusParams,
    /// Log2 boundary to which implicit register windows are rounded.
    pub alignment: u32,
}

impl BankConfig {
    /// Checks the bus parameters.
    ///
    /// # Errors
    ///
    /// See [`BusParams::validate`].
    pub fn validate(&self) -> Result<(), BuildError> {
        self.bus.validate()
    }
}

/// Registers placed behind chunked multiplexers in one address space.
#[derive(Debug)]
pub struct Bank {
    name: String,
    config: BankConfig,
    router: AddressRangeRouter<ChunkedAccessMux>,
    read_select: Option<usize>,
}

impl Bank {
    /// Creates an empty bank.
    ///
    /// # Errors
    ///
    /// See [`BankConfig::validate`].
    pub fn new(name: impl Into<String>, config: BankConfig) -> Result<Self, BuildError> {
        config.validate()?;
        let name = name.into();
        let router = AddressRangeRouter::new(name.clone(), config.bus.shape(), config.alignment);
        Ok(Self {
            name,
            config,
            router,
            read_select: None,
        })
    }

    /// Bank name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Construction parameters.
    #[must_use]
    pub const fn config(&self) -> BankConfig {
        self.config
    }

    /// Places `register` at `at`, or after the previous register when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateName`] for a register name already in
    /// the bank, and otherwise the placement errors of
    /// [`AddressRangeRouter::add`].
    pub fn add(
        &mut self,
        register: Register,
        at: Option<u64>,
    ) -> Result<AddressWindow, BuildError> {
        if self.find(register.name()).is_some() {
            return Err(BuildError::DuplicateName {
                scope: format!("bank `{}`", self.name),
                kind: "register",
                name: register.name().to_owned(),
            });
        }
        let name = register.name().to_owned();
        let mux = ChunkedAccessMux::new(register, self.config.bus.data_width)?;
        let chunks = mux.chunk_count();
        let window = self.router.add(mux, at, false)?;
        debug!(
            "bank `{}`: register `{name}` at {:#x}..{:#x} ({chunks} chunks)",
            self.name, window.start, window.end
        );
        Ok(window)
    }

    /// Rounds the next implicit placement up to a `1 << alignment` boundary.
    pub fn align_to(&mut self, alignment: u32) -> u64 {
        self.router.align_to(alignment)
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.router.iter().position(|(_, mux)| mux.register().name() == name)
    }

    fn lookup(&self, name: &str) -> Result<usize, BuildError> {
        self.find(name).ok_or_else(|| BuildError::UnknownName {
            scope: format!("bank `{}`", self.name),
            kind: "register",
            name: name.to_owned(),
        })
    }

    /// Looks up a register by name.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownName`] when no register has that name.
    pub fn register(&self, name: &str) -> Result<&Register, BuildError> {
        let index = self.lookup(name)?;
        self.router
            .get(index)
            .map(|(_, mux)| mux.register())
            .ok_or_else(|| self.missing(name))
    }

    /// Looks up a register by name for internal writes.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownName`] when no register has that name.
    pub fn register_mut(&mut self, name: &str) -> Result<&mut Register, BuildError> {
        let index = self.lookup(name)?;
        let missing = self.missing(name);
        self.router
            .get_mut(index)
            .map(|(_, mux)| mux.register_mut())
            .ok_or(missing)
    }

    /// Window of the named register.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownName`] when no register has that name.
    pub fn window(&self, name: &str) -> Result<AddressWindow, BuildError> {
        let index = self.lookup(name)?;
        self.router.get(index).map(|(window, _)| window).ok_or_else(|| self.missing(name))
    }

    fn missing(&self, name: &str) -> BuildError {
        BuildError::UnknownName {
            scope: format!("bank `{}`", self.name),
            kind: "register",
            name: name.to_owned(),
        }
    }

    /// Registers and their windows in placement order.
    pub fn registers(&self) -> impl Iterator<Item = (AddressWindow, &Register)> + '_ {
        self.router.iter().map(|(window, mux)| (window, mux.register()))
    }

    /// Asserts the reset strobe of every register for this cycle.
    pub fn reset_strobe(&mut self) {
        trace!("bank `{}`: reset strobe", self.name);
        for (_, mux) in self.router.iter_mut() {
            mux.register_mut().reset_strobe();
        }
    }
}

impl CsrTarget for Bank {
    fn params(&self) -> BusParams {
        self.config.bus
    }

    fn step(&mut self, request: &Request) -> Response {
        fan_out(&mut self.router, &mut self.read_select, request)
    }
}
