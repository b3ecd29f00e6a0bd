//! Address-range routing shared by CSR banks and bus decoders.
//!
//! A router owns an address space measured in granularity units. Each
//! subordinate is given a half-open window `[start, end)` in that space,
//! either at an explicit address or immediately after the previous window,
//! rounded up to the router's alignment. Decoding is a plain range
//! comparison; windows never overlap, so at most one matches.

use log::debug;

use crate::bits::{align_up, ceil_log2};
use crate::error::BuildError;
use crate::wishbone::Features;

/// Where a subordinate is visible in its parent address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AddressWindow {
    /// First parent address (inclusive).
    pub start: u64,
    /// Last parent address (exclusive).
    pub end: u64,
    /// Subordinate address units per parent address unit.
    pub ratio: u64,
}

impl AddressWindow {
    /// Returns `true` when `addr` falls inside the window.
    #[must_use]
    pub const fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }

    /// Number of parent addresses covered.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Returns `true` for an empty window.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Translates a parent address into the subordinate's local units.
    #[must_use]
    pub const fn translate(&self, addr: u64) -> Option<u64> {
        if self.contains(addr) {
            Some((addr - self.start) * self.ratio)
        } else {
            None
        }
    }
}

/// Geometry of a bus as seen by a router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MapShape {
    /// Word address bits.
    pub addr_width: u32,
    /// Word width in bits.
    pub data_width: u32,
    /// Smallest addressable unit in bits.
    pub granularity: u32,
    /// Optional response signals the bus carries.
    pub features: Features,
}

impl MapShape {
    /// A bus whose words are its smallest addressable unit.
    #[must_use]
    pub const fn word_addressed(addr_width: u32, data_width: u32) -> Self {
        Self {
            addr_width,
            data_width,
            granularity: data_width,
            features: Features::NONE,
        }
    }

    /// Granularity units per word.
    #[must_use]
    pub const fn lanes(&self) -> u64 {
        if self.granularity == 0 {
            1
        } else {
            (self.data_width / self.granularity) as u64
        }
    }

    /// Address bits counted in granularity units.
    #[must_use]
    pub const fn map_addr_width(&self) -> u32 {
        self.addr_width + ceil_log2(self.lanes())
    }

    /// Size of the address space in granularity units.
    #[must_use]
    pub const fn span(&self) -> u64 {
        match 1_u64.checked_shl(self.map_addr_width()) {
            Some(span) => span,
            None => u64::MAX,
        }
    }
}

/// Anything a router can place in a window.
pub trait Subordinate {
    /// Bus geometry used to size the window.
    fn shape(&self) -> MapShape;
}

/// Range decoder holding one window per subordinate.
#[derive(Debug)]
pub struct AddressRangeRouter<S> {
    name: String,
    shape: MapShape,
    alignment: u32,
    next_addr: u64,
    entries: Vec<(AddressWindow, S)>,
}

impl<S> AddressRangeRouter<S> {
    /// Creates an empty router for a bus of the given shape.
    ///
    /// `alignment` is the log2 boundary to which implicit window starts are
    /// rounded.
    #[must_use]
    pub fn new(name: impl Into<String>, shape: MapShape, alignment: u32) -> Self {
        Self {
            name: name.into(),
            shape,
            alignment,
            next_addr: 0,
            entries: Vec::new(),
        }
    }

    /// Router name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bus geometry of the router.
    #[must_use]
    pub const fn shape(&self) -> MapShape {
        self.shape
    }

    /// Log2 alignment of implicit windows.
    #[must_use]
    pub const fn alignment(&self) -> u32 {
        self.alignment
    }

    /// Address at which the next implicit window would start, before
    /// alignment.
    #[must_use]
    pub const fn next_addr(&self) -> u64 {
        self.next_addr
    }

    /// Places `subordinate` and returns its window.
    ///
    /// Dense translation requires equal data widths and maps every
    /// subordinate unit; `ratio` is then the number of subordinate units per
    /// router unit. Sparse translation requires the subordinate to be word
    /// addressed and gives each subordinate word one full router word, of
    /// which only the low lanes are used.
    ///
    /// # Errors
    ///
    /// - [`BuildError::AccessViolation`] when the subordinate's granularity
    ///   is coarser than the router's, when dense data widths differ, or when
    ///   a sparse subordinate is not word addressed or is wider.
    /// - [`BuildError::CapabilityMismatch`] when the subordinate returns an
    ///   optional signal (`err`, `rty`, `stall`) the router lacks.
    /// - [`BuildError::WidthExceeded`] when the window runs past the end of
    ///   the address space.
    /// - [`BuildError::Overlap`] when the window meets an existing one.
    pub fn add(
        &mut self,
        subordinate: S,
        at: Option<u64>,
        sparse: bool,
    ) -> Result<AddressWindow, BuildError>
    where
        S: Subordinate,
    {
        let sub = subordinate.shape();
        let index = self.entries.len();
        let what = format!("subordinate #{index} of `{}`", self.name);
        if sub.granularity > self.shape.granularity {
            return Err(BuildError::access(
                what,
                format!(
                    "granularity {} is coarser than router granularity {}",
                    sub.granularity, self.shape.granularity
                ),
            ));
        }
        let (ratio, size) = if sparse {
            if sub.granularity != sub.data_width {
                return Err(BuildError::access(
                    what,
                    format!(
                        "sparse translation needs granularity equal to data width, got {} and {}",
                        sub.granularity, sub.data_width
                    ),
                ));
            }
            if sub.data_width > self.shape.data_width {
                return Err(BuildError::access(
                    what,
                    format!(
                        "data width {} is wider than router data width {}",
                        sub.data_width, self.shape.data_width
                    ),
                ));
            }
            let words = 1_u64.checked_shl(sub.addr_width).unwrap_or(u64::MAX);
            (1, words.saturating_mul(self.shape.lanes()))
        } else {
            if sub.data_width != self.shape.data_width {
                return Err(BuildError::access(
                    what,
                    format!(
                        "dense translation needs data width {}, got {}",
                        self.shape.data_width, sub.data_width
                    ),
                ));
            }
            let ratio = u64::from(self.shape.granularity / sub.granularity.max(1));
            (ratio, sub.span() / ratio.max(1))
        };
        for (flag, signal) in Features::RESPONSE_SIGNALS {
            if sub.features.contains(flag) && !self.shape.features.contains(flag) {
                return Err(BuildError::CapabilityMismatch {
                    what,
                    signal,
                    host: format!("router `{}`", self.name),
                });
            }
        }

        let start = at.unwrap_or_else(|| align_up(self.next_addr, self.alignment));
        let span = self.shape.span();
        let end = match start.checked_add(size) {
            Some(end) if end <= span => end,
            _ => {
                return Err(BuildError::WidthExceeded {
                    what: format!("window of {what}"),
                    required: start.saturating_add(size),
                    available: span,
                })
            }
        };
        for (existing_index, (existing, _)) in self.entries.iter().enumerate() {
            if start < existing.end && existing.start < end {
                return Err(BuildError::Overlap {
                    what,
                    start,
                    end,
                    other: format!("subordinate #{existing_index}"),
                    other_start: existing.start,
                    other_end: existing.end,
                });
            }
        }

        let window = AddressWindow { start, end, ratio };
        debug!(
            "{}: window {:#x}..{:#x} ratio {} for subordinate #{index}",
            self.name, window.start, window.end, window.ratio
        );
        self.next_addr = end;
        self.entries.push((window, subordinate));
        Ok(window)
    }

    /// Rounds the next implicit placement up to a `1 << alignment` boundary
    /// (never finer than the router's own alignment) and returns it.
    pub fn align_to(&mut self, alignment: u32) -> u64 {
        self.next_addr = align_up(self.next_addr, alignment.max(self.alignment));
        self.next_addr
    }

    /// Finds the window containing `addr` and returns its index together
    /// with the translated local address.
    #[must_use]
    pub fn route(&self, addr: u64) -> Option<(usize, u64)> {
        self.entries
            .iter()
            .enumerate()
            .find_map(|(index, (window, _))| window.translate(addr).map(|local| (index, local)))
    }

    /// Number of subordinates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing has been placed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Windows in placement order.
    pub fn windows(&self) -> impl Iterator<Item = AddressWindow> + '_ {
        self.entries.iter().map(|(window, _)| *window)
    }

    /// Window and subordinate at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<(AddressWindow, &S)> {
        self.entries.get(index).map(|(window, sub)| (*window, sub))
    }

    /// Window and mutable subordinate at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<(AddressWindow, &mut S)> {
        self.entries.get_mut(index).map(|(window, sub)| (*window, sub))
    }

    /// Iterates over windows and subordinates.
    pub fn iter(&self) -> impl Iterator<Item = (AddressWindow, &S)> + '_ {
        self.entries.iter().map(|(window, sub)| (*window, sub))
    }

    /// Iterates mutably over windows and subordinates.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (AddressWindow, &mut S)> + '_ {
        self.entries.iter_mut().map(|(window, sub)| (*window, sub))
    }
}
