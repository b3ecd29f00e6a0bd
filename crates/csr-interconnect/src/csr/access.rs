use core::fmt;

/// Bus access mode of a register or field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Access {
    /// Read-only.
    R,
    /// Write-only.
    W,
    /// Read-write.
    RW,
}

impl Access {
    /// Returns `true` when the bus may read through this mode.
    #[must_use]
    pub const fn readable(self) -> bool {
        matches!(self, Self::R | Self::RW)
    }

    /// Returns `true` when the bus may write through this mode.
    #[must_use]
    pub const fn writable(self) -> bool {
        matches!(self, Self::W | Self::RW)
    }

    /// Returns `true` when every operation permitted by `other` is also
    /// permitted by `self`.
    #[must_use]
    pub const fn allows(self, other: Self) -> bool {
        (self.readable() || !other.readable()) && (self.writable() || !other.writable())
    }

    /// Short lowercase mnemonic (`r`, `w` or `rw`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::R => "r",
            Self::W => "w",
            Self::RW => "rw",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
