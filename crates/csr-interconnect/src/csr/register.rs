//! Register layout, bus element port and per-cycle write resolution.
//!
//! A [`RegisterBuilder`] collects [`Field`]s and freezes them into a
//! [`Register`]. The register is then driven one clock edge at a time: any
//! combination of reset strobe, per-field internal writes, a whole-register
//! internal write and a bus write may be requested before
//! [`Register::clock_edge`], which applies the highest-priority source for
//! every field and clears all requests.

use log::debug;

use crate::bits::{mask, significant_bits, MAX_REGISTER_WIDTH};
use crate::csr::{Access, Field};
use crate::error::BuildError;

/// Strobes driven into a register's bus-facing element for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ElementRequest {
    /// Read strobe.
    pub r_stb: bool,
    /// Write strobe.
    pub w_stb: bool,
    /// Write data, full register width.
    pub w_data: u128,
}

/// Registered read data of a register's bus-facing element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ElementResponse {
    /// Readable bits sampled on the previous cycle's read strobe, else 0.
    pub r_data: u128,
}

/// Two-phase builder for [`Register`].
#[derive(Debug, Clone)]
pub struct RegisterBuilder {
    name: String,
    access: Access,
    width: Option<u32>,
    description: Option<String>,
    atomic_read: bool,
    atomic_write: bool,
    fields: Vec<Field>,
    bitcount: u32,
}

impl RegisterBuilder {
    /// Starts a register with the given name and access mode.
    #[must_use]
    pub fn new(name: impl Into<String>, access: Access) -> Self {
        Self {
            name: name.into(),
            access,
            width: None,
            description: None,
            atomic_read: false,
            atomic_write: false,
            fields: Vec::new(),
            bitcount: 0,
        }
    }

    /// Fixes the register width instead of deriving it from the fields.
    ///
    /// Set this before adding fields so that each one is checked against it.
    #[must_use]
    pub const fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Attaches free-form documentation.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Makes both chunked reads and chunked writes atomic.
    #[must_use]
    pub const fn atomic(mut self, atomic: bool) -> Self {
        self.atomic_read = atomic;
        self.atomic_write = atomic;
        self
    }

    /// Makes chunked reads serve a snapshot latched on the first chunk.
    #[must_use]
    pub const fn atomic_read(mut self, atomic: bool) -> Self {
        self.atomic_read = atomic;
        self
    }

    /// Makes chunked writes commit together on the last chunk.
    #[must_use]
    pub const fn atomic_write(mut self, atomic: bool) -> Self {
        self.atomic_write = atomic;
        self
    }

    /// Chaining form of [`RegisterBuilder::add_field`].
    ///
    /// # Errors
    ///
    /// See [`RegisterBuilder::add_field`].
    pub fn field(mut self, field: Field) -> Result<Self, BuildError> {
        self.add_field(field)?;
        Ok(self)
    }

    /// Attaches a field, placing it after the current bit count unless it
    /// carries an explicit start bit.
    ///
    /// # Errors
    ///
    /// - [`BuildError::DuplicateName`] for a second field with the same name.
    /// - [`BuildError::InvalidParameter`] for a zero-width field.
    /// - [`BuildError::AccessViolation`] when the field mode is broader than
    ///   the register mode.
    /// - [`BuildError::WidthExceeded`] when the reset value or a named value
    ///   does not fit the field, or the field runs past the register width.
    /// - [`BuildError::Overlap`] when the bit range meets a sibling field.
    pub fn add_field(&mut self, mut field: Field) -> Result<(), BuildError> {
        if self.fields.iter().any(|existing| existing.name() == field.name()) {
            return Err(BuildError::DuplicateName {
                scope: format!("register `{}`", self.name),
                kind: "field",
                name: field.name().to_owned(),
            });
        }
        if field.width() == 0 {
            return Err(BuildError::invalid("field width", "at least 1", field.width()));
        }

        let access = field.access().unwrap_or(self.access);
        if !self.access.allows(access) {
            return Err(BuildError::access(
                format!("field `{}`", field.name()),
                format!(
                    "mode {access} is broader than register `{}` mode {}",
                    self.name, self.access
                ),
            ));
        }

        if field.reset() & !mask(field.width()) != 0 {
            return Err(BuildError::WidthExceeded {
                what: format!("reset value {:#x} of field `{}`", field.reset(), field.name()),
                required: significant_bits(field.reset()).into(),
                available: field.width().into(),
            });
        }
        for (name, value) in field.values() {
            field.check_value_fits(name, *value)?;
        }

        let startbit = field.startbit().unwrap_or(self.bitcount);
        let end = u64::from(startbit) + u64::from(field.width());
        let available = self.width.unwrap_or(MAX_REGISTER_WIDTH);
        if end > u64::from(available) {
            return Err(BuildError::WidthExceeded {
                what: format!("field `{}` of register `{}`", field.name(), self.name),
                required: end,
                available: available.into(),
            });
        }
        for sibling in &self.fields {
            let (Some(other_start), Some(other_end)) = (sibling.startbit(), sibling.endbit()) else {
                continue;
            };
            let (other_start, other_end) = (u64::from(other_start), u64::from(other_end) + 1);
            if u64::from(startbit) < other_end && other_start < end {
                return Err(BuildError::Overlap {
                    what: format!("field `{}`", field.name()),
                    start: startbit.into(),
                    end,
                    other: format!("field `{}`", sibling.name()),
                    other_start,
                    other_end,
                });
            }
        }

        field.place(startbit, access);
        self.bitcount = self.bitcount.max(startbit + field.width());
        self.fields.push(field);
        Ok(())
    }

    /// Freezes the layout.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidParameter`] when the resulting width is 0
    /// or above 128 bits.
    pub fn build(self) -> Result<Register, BuildError> {
        let width = self.width.unwrap_or(self.bitcount);
        if width == 0 || width > MAX_REGISTER_WIDTH {
            return Err(BuildError::invalid(
                "register width",
                "between 1 and 128 bits",
                width,
            ));
        }

        let bitmask = |mode: Access| {
            self.fields
                .iter()
                .filter(|field| field.access().is_some_and(|access| access_matches(access, mode)))
                .fold(0, |acc, field| acc | field.register_mask())
        };
        let read_mask = bitmask(Access::R);
        let write_mask = bitmask(Access::W);
        let rw_mask = bitmask(Access::RW);
        let field_mask = self.fields.iter().fold(0, |acc, field| acc | field.register_mask());
        let reset_value = self.fields.iter().fold(0, |acc, field| {
            acc | field.startbit().map_or(0, |start| field.reset() << start)
        });

        debug!(
            "register `{}` built: width={width} fields={} r={read_mask:#x} w={write_mask:#x}",
            self.name,
            self.fields.len()
        );

        let field_count = self.fields.len();
        Ok(Register {
            name: self.name,
            access: self.access,
            width,
            description: self.description,
            atomic_read: self.atomic_read,
            atomic_write: self.atomic_write,
            fields: self.fields,
            read_mask,
            write_mask,
            rw_mask,
            field_mask,
            reset_value,
            value: reset_value,
            r_data: 0,
            pending: PendingWrites::new(field_count),
        })
    }
}

/// Whether a field with `access` contributes to the bitmask of `mode`.
///
/// `R` and `W` select every field able to read or write; `RW` selects only
/// read-write fields.
const fn access_matches(access: Access, mode: Access) -> bool {
    match mode {
        Access::R => access.readable(),
        Access::W => access.writable(),
        Access::RW => matches!(access, Access::RW),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingWrites {
    reset: bool,
    fields: Vec<Option<u128>>,
    internal: Option<u128>,
    bus_data: u128,
    bus_enable: u128,
}

impl PendingWrites {
    fn new(field_count: usize) -> Self {
        Self {
            reset: false,
            fields: vec![None; field_count],
            internal: None,
            bus_data: 0,
            bus_enable: 0,
        }
    }

    fn clear(&mut self) {
        self.reset = false;
        self.fields.iter_mut().for_each(|slot| *slot = None);
        self.internal = None;
        self.bus_data = 0;
        self.bus_enable = 0;
    }
}

/// A frozen register layout together with its current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    name: String,
    access: Access,
    width: u32,
    description: Option<String>,
    atomic_read: bool,
    atomic_write: bool,
    fields: Vec<Field>,
    read_mask: u128,
    write_mask: u128,
    rw_mask: u128,
    field_mask: u128,
    reset_value: u128,
    value: u128,
    r_data: u128,
    pending: PendingWrites,
}

impl Register {
    /// Register name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register access mode.
    #[must_use]
    pub const fn access(&self) -> Access {
        self.access
    }

    /// Width in bits.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether chunked reads are served from a snapshot.
    #[must_use]
    pub const fn is_atomic_read(&self) -> bool {
        self.atomic_read
    }

    /// Whether chunked writes are committed together.
    #[must_use]
    pub const fn is_atomic_write(&self) -> bool {
        self.atomic_write
    }

    /// Fields in declaration order, each with its resolved start bit and mode.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Looks up a field by name.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownName`] when no field has that name.
    pub fn field(&self, name: &str) -> Result<&Field, BuildError> {
        self.field_index(name).map(|index| &self.fields[index])
    }

    fn field_index(&self, name: &str) -> Result<usize, BuildError> {
        self.fields
            .iter()
            .position(|field| field.name() == name)
            .ok_or_else(|| BuildError::UnknownName {
                scope: format!("register `{}`", self.name),
                kind: "field",
                name: name.to_owned(),
            })
    }

    /// Bits of the fields whose mode permits `mode`.
    ///
    /// For [`Access::RW`] only read-write fields are selected.
    #[must_use]
    pub const fn access_bitmask(&self, mode: Access) -> u128 {
        match mode {
            Access::R => self.read_mask,
            Access::W => self.write_mask,
            Access::RW => self.rw_mask,
        }
    }

    /// Value loaded by a reset strobe.
    #[must_use]
    pub const fn reset_value(&self) -> u128 {
        self.reset_value
    }

    /// Current value.
    #[must_use]
    pub const fn read(&self) -> u128 {
        self.value
    }

    /// Current value of one field, shifted down to bit 0.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownName`] for an undeclared field.
    pub fn read_field(&self, name: &str) -> Result<u128, BuildError> {
        let field = self.field(name)?;
        let start = field.startbit().unwrap_or(0);
        Ok((self.value & field.register_mask()) >> start)
    }

    /// What the bus sees on a read this cycle: readable bits only, and
    /// nothing at all when the register itself is not readable.
    #[must_use]
    pub const fn bus_read_value(&self) -> u128 {
        if self.access.readable() {
            self.value & self.read_mask
        } else {
            0
        }
    }

    /// Requests a bus write of the whole register for this cycle.
    ///
    /// Only bits of writable fields are affected.
    pub fn write_request(&mut self, data: u128, strobe: bool) {
        if strobe {
            self.write_bits(data, mask(self.width));
        }
    }

    /// Requests a bus write of the bits selected by `enable` for this cycle.
    pub(crate) fn write_bits(&mut self, data: u128, enable: u128) {
        let pending = &mut self.pending;
        pending.bus_data = (pending.bus_data & !enable) | (data & enable);
        pending.bus_enable |= enable;
    }

    /// Requests an internal write of the whole register for this cycle.
    pub fn internal_write_request(&mut self, data: u128, strobe: bool) {
        if strobe {
            self.pending.internal = Some(data);
        }
    }

    /// Requests an internal write of one field for this cycle.
    ///
    /// `value` is truncated to the field width.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownName`] for an undeclared field.
    pub fn field_write_request(&mut self, name: &str, value: u128) -> Result<(), BuildError> {
        let index = self.field_index(name)?;
        let width = self.fields[index].width();
        self.pending.fields[index] = Some(value & mask(width));
        Ok(())
    }

    /// Requests an internal write of a field's named value for this cycle.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownName`] when either the field or the
    /// value name is undeclared.
    pub fn field_write_named(&mut self, name: &str, value_name: &str) -> Result<(), BuildError> {
        let index = self.field_index(name)?;
        let field = &self.fields[index];
        let encoded = field.encode(field.value_of(value_name)?);
        self.pending.fields[index] = Some(encoded);
        Ok(())
    }

    /// Requests a reset for this cycle.
    pub fn reset_strobe(&mut self) {
        self.pending.reset = true;
    }

    /// Applies the requests of the current cycle and clears them.
    ///
    /// Per field, the first active source wins: reset strobe, then the
    /// field's own internal write, then the whole-register internal write,
    /// then a bus write on the field's writable bits.
    pub fn clock_edge(&mut self) {
        let pending = &self.pending;
        let next = if pending.reset {
            self.reset_value
        } else {
            self.fields
                .iter()
                .zip(&pending.fields)
                .fold(0, |acc, (field, field_write)| {
                    let bits = field.register_mask();
                    let start = field.startbit().unwrap_or(0);
                    let value = if let Some(data) = field_write {
                        data << start
                    } else if let Some(data) = pending.internal {
                        data
                    } else {
                        let enable = pending.bus_enable & self.write_mask;
                        (self.value & !enable) | (pending.bus_data & enable)
                    };
                    acc | (value & bits)
                })
        };
        self.value = next & self.field_mask;
        self.pending.clear();
    }

    /// Drives the bus-facing element for one cycle and performs the edge.
    ///
    /// The returned read data is what was sampled on the previous cycle's
    /// read strobe.
    pub fn step(&mut self, request: &ElementRequest) -> ElementResponse {
        let response = ElementResponse {
            r_data: self.r_data,
        };
        self.r_data = if request.r_stb {
            self.bus_read_value()
        } else {
            0
        };
        if request.w_stb && self.access.writable() {
            self.write_request(request.w_data, true);
        }
        self.clock_edge();
        response
    }
}
