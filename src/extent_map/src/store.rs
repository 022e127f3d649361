use std::{collections::BTreeMap, ops::Bound::*};

use utils::BlockRange;

use crate::Extent;

/// Extents keyed by their starting LBA.
///
/// Extents are handed out by value; a copy stays a valid handle to the stored extent for
/// as long as its `lba` is unchanged. Precondition violations panic.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct ExtentStore {
    map: BTreeMap<u64, Extent>,
}

impl std::fmt::Debug for ExtentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.map.values()).finish()
    }
}

impl ExtentStore {
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn insert(&mut self, e: Extent) {
        if e.len == 0 {
            panic!("cannot store zero-length extent {}", e);
        }
        let range = e.logical();
        if let Some(prev) = self.map.range(..=e.lba).next_back().map(|(_, p)| *p) {
            if prev.lba == e.lba {
                panic!("new extent {} has the same lba as {}", e, prev);
            }
            if prev.logical().overlaps(&range) {
                panic!("new extent {} overlaps predecessor {}", e, prev);
            }
        }
        if let Some(next) = self.next_after(e.lba) {
            if next.logical().overlaps(&range) {
                panic!("new extent {} overlaps successor {}", e, next);
            }
        }
        self.map.insert(e.lba, e);
    }

    #[cfg(test)]
    pub(crate) fn insert_unchecked(&mut self, e: Extent) {
        self.map.insert(e.lba, e);
    }

    /// Removes the stored extent `e` and hands it back.
    pub fn remove(&mut self, e: &Extent) -> Extent {
        match self.map.remove(&e.lba) {
            Some(stored) if stored == *e => stored,
            Some(stored) => panic!("attempt to remove {}, but the store holds {}", e, stored),
            None => panic!("attempt to remove extent {} which is not stored", e),
        }
    }

    /// Changes the length of the extent starting at `lba` in place, returning the result.
    pub fn set_len(&mut self, lba: u64, len: u64) -> Extent {
        if len == 0 {
            panic!("cannot shrink extent at lba {} to zero blocks", lba);
        }
        let next = self.next_after(lba);
        let e = self
            .map
            .get_mut(&lba)
            .unwrap_or_else(|| panic!("no extent starts at lba {}", lba));
        let old = *e;
        e.len = len;
        if let Some(next) = next {
            if e.end() > next.lba {
                let grown = *e;
                *e = old;
                panic!("growing {} to {} overlaps successor {}", old, grown, next);
            }
        }
        *e
    }

    pub fn get(&self, lba: u64) -> Option<Extent> {
        self.map.get(&lba).copied()
    }

    /// Left-most extent that is not entirely below `r`: the one overlapping `r.start` if any,
    /// otherwise the lowest extent above it. Since stored extents never overlap, the answer
    /// only depends on `r.start`.
    pub fn find_overlap_or_higher(&self, r: &BlockRange) -> Option<Extent> {
        debug_assert!(r.start < r.end, "empty query range {:?}", r);
        self.geq(r.start)
    }

    /// Extent containing `lba`, or the next higher one.
    pub fn geq(&self, lba: u64) -> Option<Extent> {
        if let Some((_, e)) = self.map.range(..=lba).next_back() {
            if e.contains(lba) {
                return Some(*e);
            }
        }
        self.next_after(lba)
    }

    pub fn successor(&self, e: &Extent) -> Option<Extent> {
        self.next_after(e.lba)
    }

    pub fn predecessor(&self, e: &Extent) -> Option<Extent> {
        self.map.range(..e.lba).next_back().map(|(_, p)| *p)
    }

    pub fn first(&self) -> Option<Extent> {
        self.map.values().next().copied()
    }

    pub fn last(&self) -> Option<Extent> {
        self.map.values().next_back().copied()
    }

    /// Ascending traversal. Each call starts over from the lowest extent.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Extent> + '_ {
        self.map.values()
    }

    /// Ascending traversal of the extents starting at or after `lba`.
    pub fn iter_from(&self, lba: u64) -> impl Iterator<Item = &Extent> + '_ {
        self.map.range(lba..).map(|(_, e)| e)
    }

    fn next_after(&self, lba: u64) -> Option<Extent> {
        self.map
            .range((Excluded(lba), Unbounded))
            .next()
            .map(|(_, e)| *e)
    }
}
