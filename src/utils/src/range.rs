use serde::{Deserialize, Serialize};

/// Half-open interval `[start, end)`.
#[derive(PartialEq, Eq, Copy, Clone, Default, Hash, Serialize, Deserialize)]
pub struct Range<T> {
    pub start: T,
    pub end: T,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Range<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}, {:?})", self.start, self.end)
    }
}

impl<T: num::Integer> Ord for Range<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.start.cmp(&other.start)
    }
}

impl<T: num::Integer> PartialOrd for Range<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: num::Integer + num::CheckedAdd + Copy> Range<T> {
    /// Returns `[start, start + len)`, or `None` if the end does not fit in `T`.
    pub fn checked_from_start_len(start: T, len: T) -> Option<Self> {
        let end = start.checked_add(&len)?;
        Some(Self { start, end })
    }

    #[inline]
    pub fn from_start_len(start: T, len: T) -> Self {
        Self {
            start,
            end: start + len,
        }
    }

    #[inline]
    pub fn len(&self) -> T {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn intersect(&self, r: &Self) -> Self {
        let start = std::cmp::max(r.start, self.start);
        let end = std::cmp::max(std::cmp::min(r.end, self.end), start);
        Self { start, end }
    }

    #[inline]
    pub fn overlaps(&self, r: &Self) -> bool {
        self.start < r.end && r.start < self.end
    }

    /// Whether `r` begins exactly where `self` ends.
    #[inline]
    pub fn adjoins(&self, r: &Self) -> bool {
        self.end == r.start
    }

    #[inline]
    pub fn can_split_at(&self, k: T) -> bool {
        self.start < k && k < self.end
    }

    #[inline]
    pub fn contains(&self, k: T) -> bool {
        self.start <= k && k < self.end
    }

    #[inline]
    pub fn is_superset_of(&self, r: &Self) -> bool {
        self.start <= r.start && r.end <= self.end
    }

    #[inline]
    pub fn is_well_formed(&self) -> bool {
        self.start <= self.end
    }
}

pub type BlockRange = Range<u64>;
