//! Named bit ranges and their optional named-value tables.

use crate::bits::{bits_for, mask};
use crate::csr::Access;
use crate::error::BuildError;

/// A named bit range inside a register.
///
/// Fields are built standalone and then handed to a
/// [`RegisterBuilder`](crate::csr::RegisterBuilder), which assigns the
/// start bit when none was given and resolves an inherited access mode.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Field {
    name: String,
    access: Option<Access>,
    width: u32,
    startbit: Option<u32>,
    reset: u128,
    values: Vec<(String, i64)>,
    description: Option<String>,
}

impl Field {
    /// Creates a one-bit field with no declared access mode and reset value 0.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            access: None,
            width: 1,
            startbit: None,
            reset: 0,
            values: Vec::new(),
            description: None,
        }
    }

    /// Declares an access mode; without one the field inherits its register's.
    #[must_use]
    pub const fn with_access(mut self, access: Access) -> Self {
        self.access = Some(access);
        self
    }

    /// Sets the width in bits.
    #[must_use]
    pub const fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    /// Pins the field to an explicit start bit.
    #[must_use]
    pub const fn at(mut self, startbit: u32) -> Self {
        self.startbit = Some(startbit);
        self
    }

    /// Sets the value loaded on reset.
    #[must_use]
    pub const fn with_reset(mut self, reset: u128) -> Self {
        self.reset = reset;
        self
    }

    /// Attaches free-form documentation.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds named values in order, see [`Field::add_value`].
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by [`Field::add_value`].
    pub fn with_values<I, N>(mut self, values: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = (N, Option<i64>)>,
        N: Into<String>,
    {
        for (name, value) in values {
            self.add_value(name, value)?;
        }
        Ok(self)
    }

    /// Adds one entry to the named-value table and returns its value.
    ///
    /// Without an explicit value the entry takes one more than the largest
    /// value already present, or 0 for an empty table.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateName`] when the name is taken and
    /// [`BuildError::WidthExceeded`] when the value does not fit the field
    /// width, signed or unsigned.
    pub fn add_value(
        &mut self,
        name: impl Into<String>,
        value: Option<i64>,
    ) -> Result<i64, BuildError> {
        let name = name.into();
        if self.values.iter().any(|(existing, _)| *existing == name) {
            return Err(BuildError::DuplicateName {
                scope: format!("field `{}`", self.name),
                kind: "value",
                name,
            });
        }
        let value = match value {
            Some(value) => value,
            None => self
                .values
                .iter()
                .map(|(_, value)| *value)
                .max()
                .map_or(0, |max| max.saturating_add(1)),
        };
        self.check_value_fits(&name, value)?;
        self.values.push((name, value));
        Ok(value)
    }

    pub(crate) fn check_value_fits(&self, name: &str, value: i64) -> Result<(), BuildError> {
        let required = bits_for(value);
        if required > self.width {
            return Err(BuildError::WidthExceeded {
                what: format!("value `{name}` ({value}) of field `{}`", self.name),
                required: required.into(),
                available: self.width.into(),
            });
        }
        Ok(())
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Access mode; always `Some` once the field belongs to a register.
    #[must_use]
    pub const fn access(&self) -> Option<Access> {
        self.access
    }

    /// Width in bits.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// First bit; always `Some` once the field belongs to a register.
    #[must_use]
    pub const fn startbit(&self) -> Option<u32> {
        self.startbit
    }

    /// Last bit (inclusive), when placed.
    #[must_use]
    pub const fn endbit(&self) -> Option<u32> {
        match self.startbit {
            Some(start) => Some(start.saturating_add(self.width).saturating_sub(1)),
            None => None,
        }
    }

    /// Reset value.
    #[must_use]
    pub const fn reset(&self) -> u128 {
        self.reset
    }

    /// Description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Named values in declaration order.
    #[must_use]
    pub fn values(&self) -> &[(String, i64)] {
        &self.values
    }

    /// Looks up a named value.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownName`] when no entry has that name.
    pub fn value_of(&self, name: &str) -> Result<i64, BuildError> {
        self.values
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| *value)
            .ok_or_else(|| BuildError::UnknownName {
                scope: format!("field `{}`", self.name),
                kind: "value",
                name: name.to_owned(),
            })
    }

    /// Bits occupied by the field inside its register (zero when unplaced).
    #[must_use]
    pub const fn register_mask(&self) -> u128 {
        match self.startbit {
            Some(start) => match mask(self.width).checked_shl(start) {
                Some(bits) => bits,
                None => 0,
            },
            None => 0,
        }
    }

    /// Encodes a possibly negative field value into the field's bit pattern.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn encode(&self, value: i64) -> u128 {
        (value as i128 as u128) & mask(self.width)
    }

    pub(crate) fn place(&mut self, startbit: u32, access: Access) {
        self.startbit = Some(startbit);
        self.access = Some(access);
    }
}
