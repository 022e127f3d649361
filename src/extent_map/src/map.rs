use anyhow::bail;
use utils::BlockRange;

use crate::{
    CorruptionKind, CorruptionReport, Extent, ExtentMapConfig, ExtentMapError, ExtentMapResult,
    ExtentStore,
};

/// Logical to physical block address map.
///
/// Extents are sorted by LBA, never overlap, and two extents that continue each other both
/// logically and physically are always stored as one.
#[derive(Debug, Default, Clone)]
pub struct ExtentMap {
    store: ExtentStore,
    config: ExtentMapConfig,
}

impl ExtentMap {
    pub fn new() -> Self {
        Self::with_config(ExtentMapConfig::default())
    }

    pub fn with_config(config: ExtentMapConfig) -> Self {
        Self {
            store: ExtentStore::new(),
            config,
        }
    }

    pub fn config(&self) -> &ExtentMapConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Extent> + '_ {
        self.store.iter()
    }

    pub fn first(&self) -> Option<Extent> {
        self.store.first()
    }

    pub fn last(&self) -> Option<Extent> {
        self.store.last()
    }

    /// Extent containing `lba`, or the next higher extent if none does.
    pub fn query(&self, lba: u64) -> Option<Extent> {
        self.store.geq(lba)
    }

    /// Physical address backing `lba`, if it is mapped.
    pub fn translate(&self, lba: u64) -> Option<u64> {
        self.store.geq(lba).and_then(|e| e.translate(lba))
    }

    /// Number of mapped logical blocks.
    pub fn mapped_blocks(&self) -> u64 {
        self.store.iter().map(|e| e.len).sum()
    }

    /// Number of mapped logical blocks inside `r`. An inverted range maps nothing.
    pub fn mapped_blocks_in(&self, r: BlockRange) -> u64 {
        debug_assert!(r.is_well_formed(), "invalid range: {:?}", r);
        if !r.is_well_formed() || r.is_empty() {
            return 0;
        }
        let first = match self.store.find_overlap_or_higher(&r) {
            Some(e) => e,
            None => return 0,
        };
        self.store
            .iter_from(first.lba)
            .take_while(|e| e.lba < r.end)
            .map(|e| e.logical().intersect(&r).len())
            .sum()
    }

    /// Maps `[lba, lba + len)` to `[pba, pba + len)`, replacing whatever the range mapped
    /// before. Extents the range touches are truncated, split, shifted or dropped, and the
    /// new extent is coalesced with physically contiguous neighbours.
    ///
    /// Fails without touching the map if the triple cannot be stored or the extent budget
    /// would be exceeded.
    pub fn update_range(&mut self, lba: u64, pba: u64, len: u64) -> ExtentMapResult<()> {
        let new = Extent::checked_new(lba, pba, len)?;
        let first = self.store.find_overlap_or_higher(&new.logical());
        self.reserve(&new, first)?;

        match first {
            Some(e) => self.resolve_overlaps(new, e),
            None => {
                logger::trace!("{} lies above every extent", new);
                self.insert_and_merge(new);
            }
        }

        if self.config.validate_on_update {
            if let Err(report) = self.validate() {
                panic!(
                    "corruption after update_range(lba: {} pba: {} len: {}): {}",
                    lba, pba, len, report
                );
            }
        }
        Ok(())
    }

    // `e` is the left-most extent not entirely below `new`.
    fn resolve_overlaps(&mut self, new: Extent, e: Extent) {
        let end = new.end();
        if e.lba >= end {
            logger::trace!("no overlap: {} ends before {}", new, e);
            self.insert_and_merge(new);
            return;
        }

        let mut cur = Some(e);
        if new.lba > e.lba {
            if end < e.end() {
                logger::trace!("inner overwrite: {} splits {}", new, e);
                let right = e.split_off(end);
                self.store.set_len(e.lba, new.lba - e.lba);
                self.insert_and_merge(new);
                self.insert_and_merge(right);
                return;
            }
            self.store.set_len(e.lba, new.lba - e.lba);
            if end == e.end() {
                logger::trace!("right edge match: {} truncates {}", new, e);
                self.insert_and_merge(new);
                return;
            }
            logger::trace!("right overlap: {} truncates {}", new, e);
            cur = self.store.successor(&e);
        }

        while let Some(c) = cur {
            if !new.logical().is_superset_of(&c.logical()) {
                break;
            }
            logger::trace!("{} covers {}", new, c);
            cur = self.store.successor(&c);
            self.store.remove(&c);
        }

        let c = match cur {
            Some(c) if c.lba < end => c,
            _ => {
                self.insert_and_merge(new);
                return;
            }
        };
        if new.lba <= c.lba && end < c.end() {
            logger::trace!("left overlap: {} shifts {}", new, c);
            let mut shifted = self.store.remove(&c);
            shifted.advance(end - c.lba);
            self.store.insert(shifted);
            self.insert_and_merge(new);
            return;
        }
        unreachable!("update_range: no case resolves {} against {}", new, c);
    }

    fn insert_and_merge(&mut self, e: Extent) -> Extent {
        self.store.insert(e);
        self.merge_neighbors(e)
    }

    /// Coalesces the extent starting at `lba` with its neighbours where they are both
    /// logically and physically contiguous. Returns the surviving extent, or `None` if no
    /// extent starts at `lba`.
    pub fn merge(&mut self, lba: u64) -> Option<Extent> {
        let e = self.store.get(lba)?;
        Some(self.merge_neighbors(e))
    }

    fn merge_neighbors(&mut self, mut e: Extent) -> Extent {
        if let Some(prev) = self.store.predecessor(&e) {
            if prev.is_contiguous_with(&e) {
                logger::trace!("merging {} into {}", e, prev);
                self.store.remove(&e);
                e = self.store.set_len(prev.lba, prev.len + e.len);
            }
        }
        if let Some(next) = self.store.successor(&e) {
            if e.is_contiguous_with(&next) {
                logger::trace!("merging {} into {}", next, e);
                self.store.remove(&next);
                e = self.store.set_len(e.lba, e.len + next.len);
            }
        }
        e
    }

    // Fails if the map could outgrow `max_extents`. The bound ignores merges, so an update
    // that would merge may still be refused on a full map.
    fn reserve(&self, new: &Extent, first: Option<Extent>) -> ExtentMapResult<()> {
        let limit = match self.config.max_extents {
            Some(limit) => limit,
            None => return Ok(()),
        };
        let required = self.projected_len(new, first);
        if required > limit {
            logger::warn!(
                "refusing {}: needs up to {} extents, limit is {}",
                new,
                required,
                limit
            );
            return Err(ExtentMapError::CapacityExhausted { limit, required });
        }
        Ok(())
    }

    fn projected_len(&self, new: &Extent, first: Option<Extent>) -> usize {
        let end = new.end();
        match first {
            Some(e) if new.lba > e.lba && end < e.end() => self.store.len() + 2,
            _ => {
                let covered = self
                    .store
                    .iter_from(new.lba)
                    .take_while(|e| e.end() <= end)
                    .count();
                self.store.len() + 1 - covered
            }
        }
    }

    /// Walks every extent and checks ordering, positivity, non-overlap and that no two
    /// contiguous extents were left unmerged.
    pub fn validate(&self) -> Result<(), CorruptionReport> {
        let mut prev: Option<Extent> = None;
        for e in self.store.iter() {
            if e.len == 0 {
                return Err(CorruptionReport::single(CorruptionKind::ZeroLength, *e));
            }
            if e.pba == 0 {
                return Err(CorruptionReport::single(CorruptionKind::ZeroPba, *e));
            }
            if let Some(p) = prev {
                if p.lba == e.lba {
                    return Err(CorruptionReport::pair(CorruptionKind::DuplicateLba, p, *e));
                }
                if p.lba > e.lba || p.logical().overlaps(&e.logical()) {
                    return Err(CorruptionReport::pair(CorruptionKind::Overlap, p, *e));
                }
                if p.is_contiguous_with(e) {
                    return Err(CorruptionReport::pair(CorruptionKind::Unmerged, p, *e));
                }
            }
            prev = Some(*e);
        }
        Ok(())
    }

    /// Loads `extents`, which must be sorted by LBA, non-overlapping and already coalesced,
    /// into an empty map.
    pub fn import_sorted(&mut self, extents: &[Extent]) -> anyhow::Result<()> {
        if !self.is_empty() {
            bail!("cannot import into non-empty map");
        }
        let mut prev: Option<Extent> = None;
        for e in extents {
            Extent::checked_new(e.lba, e.pba, e.len)?;
            if let Some(p) = prev {
                if e.lba < p.end() {
                    bail!(
                        "extent {} overlaps a preceding extent or is incorrectly sorted",
                        e
                    );
                }
                if p.is_contiguous_with(e) {
                    bail!("extent {} continues {} and should be merged with it", e, p);
                }
            }
            prev = Some(*e);
        }
        if let Some(limit) = self.config.max_extents {
            if extents.len() > limit {
                return Err(ExtentMapError::CapacityExhausted {
                    limit,
                    required: extents.len(),
                }
                .into());
            }
        }
        for e in extents {
            self.store.insert(*e);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn store_mut(&mut self) -> &mut ExtentStore {
        &mut self.store
    }
}
