use thiserror::Error;

/// Coarse classification of elaboration failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ErrorKind {
    /// Two fields or two address windows claim the same range.
    Overlap,
    /// A value, field or window does not fit the space reserved for it.
    WidthExceeded,
    /// An access mode or data width is incompatible with its container.
    AccessViolation,
    /// One side declares an optional bus signal the other side cannot carry.
    CapabilityMismatch,
    /// Lookup of a name that was never declared.
    UnknownName,
    /// A name declared twice in the same scope.
    DuplicateName,
    /// A width or similar parameter outside its legal set.
    InvalidParameter,
}

/// Construction-time failure raised while assembling registers, banks and buses.
///
/// Every variant is fatal for the object being built: the builder that
/// returned it is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Two ranges intersect.
    #[error("{what} [{start:#x}, {end:#x}) overlaps {other} [{other_start:#x}, {other_end:#x})")]
    Overlap {
        /// Item being placed.
        what: String,
        /// Inclusive start of the rejected range.
        start: u64,
        /// Exclusive end of the rejected range.
        end: u64,
        /// Item already occupying the range.
        other: String,
        /// Inclusive start of the existing range.
        other_start: u64,
        /// Exclusive end of the existing range.
        other_end: u64,
    },
    /// A value or range exceeds the bits available for it.
    #[error("{what} needs {required} bits but only {available} are available")]
    WidthExceeded {
        /// Item that does not fit.
        what: String,
        /// Bits (or address units) required.
        required: u64,
        /// Bits (or address units) available.
        available: u64,
    },
    /// Access mode or data width incompatibility.
    #[error("{what}: {reason}")]
    AccessViolation {
        /// Item that was rejected.
        what: String,
        /// Short explanation of the conflict.
        reason: String,
    },
    /// Optional signal that the other side of a connection cannot carry.
    #[error("{what} declares optional signal `{signal}` which {host} does not support")]
    CapabilityMismatch {
        /// Interface declaring the signal.
        what: String,
        /// Signal name.
        signal: &'static str,
        /// Interface lacking it.
        host: String,
    },
    /// Name lookup failed.
    #[error("{scope} has no {kind} named `{name}`")]
    UnknownName {
        /// Container that was searched.
        scope: String,
        /// Category of the missing item.
        kind: &'static str,
        /// Name that was requested.
        name: String,
    },
    /// Name already taken.
    #[error("{scope} already has a {kind} named `{name}`")]
    DuplicateName {
        /// Container in which the clash happened.
        scope: String,
        /// Category of the clashing item.
        kind: &'static str,
        /// Clashing name.
        name: String,
    },
    /// Parameter outside its legal set.
    #[error("{parameter} must be {expected}, not {actual}")]
    InvalidParameter {
        /// Parameter name.
        parameter: &'static str,
        /// Description of the accepted values.
        expected: &'static str,
        /// Rejected value.
        actual: u64,
    },
}

impl BuildError {
    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Overlap { .. } => ErrorKind::Overlap,
            Self::WidthExceeded { .. } => ErrorKind::WidthExceeded,
            Self::AccessViolation { .. } => ErrorKind::AccessViolation,
            Self::CapabilityMismatch { .. } => ErrorKind::CapabilityMismatch,
            Self::UnknownName { .. } => ErrorKind::UnknownName,
            Self::DuplicateName { .. } => ErrorKind::DuplicateName,
            Self::InvalidParameter { .. } => ErrorKind::InvalidParameter,
        }
    }

    pub(crate) fn invalid(
        parameter: &'static str,
        expected: &'static str,
        actual: impl Into<u64>,
    ) -> Self {
        Self::InvalidParameter {
            parameter,
            expected,
            actual: actual.into(),
        }
    }

    pub(crate) fn access(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AccessViolation {
            what: what.into(),
            reason: reason.into(),
        }
    }
}
