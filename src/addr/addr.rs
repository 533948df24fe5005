use super::Range;
use static_assertions::const_assert;
use std::fmt;

//===========================================================================//

/// Represents a memory bus address on a 16-bit address bus.
#[derive(
    Clone, Copy, Debug, Default, Hash, Eq, Ord, PartialEq, PartialOrd,
)]
pub struct Addr(u16);

impl Addr {
    /// The size of this integer type in bits.
    pub const BITS: u32 = 16;

    /// The smallest address value (0).
    pub const MIN: Addr = Addr(0);

    /// The largest address value (`(1 << BITS) - 1`).
    pub const MAX: Addr = Addr(!0);

    /// Returns the address as a 32-bit integer.
    pub fn as_u32(self) -> u32 {
        u32::from(self.0)
    }

    /// Returns the address `offset` bytes after this one, wrapping around at
    /// the top of the address space.
    pub fn wrapping_add(self, offset: u16) -> Addr {
        Addr(self.0.wrapping_add(offset))
    }

    /// Returns the number of bytes from `base` up to `self`, or `None` if
    /// `self` is below `base`.
    pub fn offset_from(self, base: Addr) -> Option<usize> {
        self.0.checked_sub(base.0).map(usize::from)
    }

    /// Returns an address range that starts with `self` and contains `size`
    /// distinct addresses, or `None` if `size` is zero or if such a range
    /// would have an end address greater than `Addr::MAX`.
    pub fn range_with_size(self, size: u32) -> Option<Range> {
        const_assert!(Addr::BITS < 32);
        if size == 0 {
            return None;
        }
        let end = u32::from(self.0).checked_add(size - 1)?;
        let last = u16::try_from(end).ok()?;
        Some(Range::with_bounds(self, Addr(last)))
    }
}

impl From<u8> for Addr {
    fn from(value: u8) -> Addr {
        Addr(value.into())
    }
}

impl From<u16> for Addr {
    fn from(value: u16) -> Addr {
        Addr(value)
    }
}

impl From<Addr> for u16 {
    fn from(value: Addr) -> u16 {
        value.0
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "${:04x}", self.0)
    }
}

impl fmt::LowerHex for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        self.0.fmt(f)
    }
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::Addr;

    #[test]
    fn addr_display() {
        assert_eq!(format!("{}", Addr::from(0x8000u16)), "$8000");
        assert_eq!(format!("{}", Addr::from(0x12u8)), "$0012");
        assert_eq!(format!("{:x}", Addr::from(0xbeefu16)), "beef");
        assert_eq!(u16::from(Addr::from(0xbeefu16)), 0xbeef);
    }

    #[test]
    fn addr_wrapping_add() {
        assert_eq!(Addr::MAX.wrapping_add(1), Addr::MIN);
        assert_eq!(
            Addr::from(0x1234u16).wrapping_add(0x10),
            Addr::from(0x1244u16)
        );
    }

    #[test]
    fn addr_offset_from() {
        let base = Addr::from(0x8000u16);
        assert_eq!(Addr::from(0x8010u16).offset_from(base), Some(0x10));
        assert_eq!(base.offset_from(base), Some(0));
        assert_eq!(Addr::from(0x7fffu16).offset_from(base), None);
    }

    #[test]
    fn addr_range_with_size() {
        let range = Addr::from(0x8000u16).range_with_size(0x8000).unwrap();
        assert_eq!(range.start(), Addr::from(0x8000u16));
        assert_eq!(range.end(), Addr::MAX);
        assert!(Addr::from(0x8000u16).range_with_size(0x8001).is_none());
        assert!(Addr::MIN.range_with_size(0).is_none());
        assert!(Addr::MAX.range_with_size(u32::MAX).is_none());
    }
}

//===========================================================================//
