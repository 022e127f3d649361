use std::fmt;

use serde::{Deserialize, Serialize};
use utils::{BlockRange, Range};

use crate::{ExtentMapError, ExtentMapResult};

/// A run of `len` logical blocks starting at `lba`, stored at `pba..pba + len`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct Extent {
    pub lba: u64,
    pub pba: u64,
    pub len: u64,
}

impl Extent {
    pub const fn new(lba: u64, pba: u64, len: u64) -> Self {
        Extent { lba, pba, len }
    }

    /// Builds an extent that may be stored in a map: `len > 0`, `pba > 0` and neither the
    /// logical nor the physical run may wrap around `u64::MAX`.
    pub fn checked_new(lba: u64, pba: u64, len: u64) -> ExtentMapResult<Self> {
        if len == 0 {
            return Err(ExtentMapError::ZeroLength { lba, pba });
        }
        if pba == 0 {
            return Err(ExtentMapError::InvalidPba { lba, len });
        }
        let logical = BlockRange::checked_from_start_len(lba, len);
        let physical = BlockRange::checked_from_start_len(pba, len);
        if logical.is_none() || physical.is_none() {
            return Err(ExtentMapError::AddressOverflow { lba, pba, len });
        }
        Ok(Extent { lba, pba, len })
    }

    /// Exclusive logical end.
    #[inline]
    pub fn end(&self) -> u64 {
        self.lba + self.len
    }

    #[inline]
    pub fn logical(&self) -> BlockRange {
        Range::from_start_len(self.lba, self.len)
    }

    #[inline]
    pub fn physical(&self) -> BlockRange {
        Range::from_start_len(self.pba, self.len)
    }

    #[inline]
    pub fn contains(&self, lba: u64) -> bool {
        self.logical().contains(lba)
    }

    pub fn translate(&self, lba: u64) -> Option<u64> {
        if self.contains(lba) {
            Some(self.pba + (lba - self.lba))
        } else {
            None
        }
    }

    /// Whether `next` continues this extent both logically and physically, so the two
    /// describe a single run.
    #[inline]
    pub fn is_contiguous_with(&self, next: &Extent) -> bool {
        self.logical().adjoins(&next.logical()) && self.physical().adjoins(&next.physical())
    }

    /// The part of this extent from logical block `at` onwards.
    // precondition: self.lba < at < self.end()
    pub(crate) fn split_off(&self, at: u64) -> Extent {
        assert!(
            self.logical().can_split_at(at),
            "cannot split extent {} at {}",
            self,
            at
        );
        let diff = at - self.lba;
        Extent::new(at, self.pba + diff, self.len - diff)
    }

    /// Drops the first `diff` blocks, keeping the LBA to PBA offset.
    pub(crate) fn advance(&mut self, diff: u64) {
        assert!(diff < self.len, "cannot advance extent {} by {}", self, diff);
        self.lba += diff;
        self.pba += diff;
        self.len -= diff;
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(lba: {} pba: {} len: {})", self.lba, self.pba, self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_new() {
        assert_eq!(Extent::checked_new(0, 100, 5), Ok(Extent::new(0, 100, 5)));
        assert_eq!(
            Extent::checked_new(7, 100, 0),
            Err(ExtentMapError::ZeroLength { lba: 7, pba: 100 })
        );
        assert_eq!(
            Extent::checked_new(7, 0, 3),
            Err(ExtentMapError::InvalidPba { lba: 7, len: 3 })
        );
        assert_eq!(
            Extent::checked_new(u64::MAX - 1, 1, 2),
            Err(ExtentMapError::AddressOverflow {
                lba: u64::MAX - 1,
                pba: 1,
                len: 2
            })
        );
        assert_eq!(
            Extent::checked_new(1, u64::MAX, 1),
            Err(ExtentMapError::AddressOverflow {
                lba: 1,
                pba: u64::MAX,
                len: 1
            })
        );
    }

    #[test]
    fn translate() {
        let e = Extent::new(10, 500, 4);
        assert_eq!(e.translate(9), None);
        assert_eq!(e.translate(10), Some(500));
        assert_eq!(e.translate(13), Some(503));
        assert_eq!(e.translate(14), None);
    }

    #[test]
    fn contiguity() {
        let a = Extent::new(0, 100, 10);
        assert!(a.is_contiguous_with(&Extent::new(10, 110, 1)));
        assert!(!a.is_contiguous_with(&Extent::new(10, 500, 1)));
        assert!(!a.is_contiguous_with(&Extent::new(11, 111, 1)));
        assert!(!Extent::new(10, 110, 1).is_contiguous_with(&a));
    }

    #[test]
    fn split_and_advance() {
        let e = Extent::new(0, 100, 20);
        assert_eq!(e.split_off(10), Extent::new(10, 110, 10));

        let mut e = Extent::new(10, 100, 10);
        e.advance(5);
        assert_eq!(e, Extent::new(15, 105, 5));
    }

    #[test]
    #[should_panic(expected = "cannot split extent")]
    fn split_at_boundary() {
        Extent::new(0, 100, 20).split_off(20);
    }
}
