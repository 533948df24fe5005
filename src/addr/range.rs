use super::Addr;
use std::fmt;
use std::ops;

//===========================================================================//

/// Represents a nonempty range of bus addresses.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Range {
    first: Addr,
    last: Addr,
}

impl Range {
    /// Returns an address range that contains `first`, `last`, and all
    /// addresses in between.
    ///
    /// Panics if `last < first`.
    pub fn with_bounds(first: Addr, last: Addr) -> Range {
        assert!(first <= last);
        Range { first, last }
    }

    /// Returns the first address in the range.
    pub fn start(self) -> Addr {
        self.first
    }

    /// Returns the last address in the range.
    pub fn end(self) -> Addr {
        self.last
    }

    /// Returns the number of distinct addresses in this range.
    pub fn size(self) -> u32 {
        debug_assert!(self.first <= self.last);
        self.last.as_u32() - self.first.as_u32() + 1
    }

    /// Returns true if this range contains `addr`.
    pub fn contains(self, addr: Addr) -> bool {
        (self.first..=self.last).contains(&addr)
    }

    /// Returns the equivalent half-open range of 32-bit integers, which
    /// can represent a range ending at `Addr::MAX` without overflow.
    pub fn to_half_open(self) -> ops::Range<u32> {
        self.first.as_u32()..(self.last.as_u32() + 1)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}..={}", self.first, self.last)
    }
}

//===========================================================================//


//===========================================================================//
