//! Round-robin grant selection.

use log::trace;

use crate::error::BuildError;

/// Largest number of requesters a request bit-vector can carry.
pub const MAX_REQUESTERS: usize = u64::BITS as usize;

/// Round-robin scheduler holding the current grant.
///
/// The grant only moves on cycles where `advance` is asserted, and even then
/// never away from a requester whose request bit is still set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RoundRobin {
    count: usize,
    grant: usize,
}

impl RoundRobin {
    /// Creates a scheduler for `count` requesters, granting requester 0.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidParameter`] when `count` exceeds
    /// [`MAX_REQUESTERS`].
    pub fn new(count: usize) -> Result<Self, BuildError> {
        if count > MAX_REQUESTERS {
            return Err(BuildError::invalid(
                "requester count",
                "at most 64",
                u64::try_from(count).unwrap_or(u64::MAX),
            ));
        }
        Ok(Self { count, grant: 0 })
    }

    /// Number of requesters.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Current grant.
    #[must_use]
    pub const fn grant(&self) -> usize {
        self.grant
    }

    /// Grant that follows `grant` for the given request bits.
    ///
    /// The current holder keeps the grant while its bit is set. Otherwise the
    /// positions after it are scanned cyclically and the first one requesting
    /// wins; with no request at all the grant stays put.
    #[must_use]
    pub const fn next_grant(grant: usize, requests: u64, count: usize) -> usize {
        if count == 0 || requests >> grant & 1 == 1 {
            return grant;
        }
        let mut offset = 1;
        while offset <= count {
            let candidate = (grant + offset) % count;
            if requests >> candidate & 1 == 1 {
                return candidate;
            }
            offset += 1;
        }
        grant
    }

    /// Clocks the scheduler and returns the grant for the next cycle.
    pub fn step(&mut self, requests: u64, advance: bool) -> usize {
        if advance {
            let next = Self::next_grant(self.grant, requests, self.count);
            if next != self.grant {
                trace!("round-robin grant {} -> {next}", self.grant);
            }
            self.grant = next;
        }
        self.grant
    }

    /// Returns the grant to requester 0.
    pub fn reset(&mut self) {
        self.grant = 0;
    }
}
