use std::fmt;

use crate::Extent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtentMapError {
    ZeroLength { lba: u64, pba: u64 },
    InvalidPba { lba: u64, len: u64 },
    AddressOverflow { lba: u64, pba: u64, len: u64 },
    CapacityExhausted { limit: usize, required: usize },
}

impl fmt::Display for ExtentMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtentMapError::ZeroLength { lba, pba } => {
                write!(f, "zero-length mapping (lba: {} pba: {})", lba, pba)
            }
            ExtentMapError::InvalidPba { lba, len } => {
                write!(f, "pba 0 is not mappable (lba: {} len: {})", lba, len)
            }
            ExtentMapError::AddressOverflow { lba, pba, len } => write!(
                f,
                "mapping overflows the block address space (lba: {} pba: {} len: {})",
                lba, pba, len
            ),
            ExtentMapError::CapacityExhausted { limit, required } => write!(
                f,
                "extent budget exhausted: update needs up to {} extents, limit is {}",
                required, limit
            ),
        }
    }
}

impl std::error::Error for ExtentMapError {}

pub type ExtentMapResult<T> = std::result::Result<T, ExtentMapError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionKind {
    ZeroLength,
    ZeroPba,
    DuplicateLba,
    Overlap,
    Unmerged,
}

impl fmt::Display for CorruptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CorruptionKind::ZeroLength => "len is 0",
            CorruptionKind::ZeroPba => "pba is 0",
            CorruptionKind::DuplicateLba => "lba present in two extents",
            CorruptionKind::Overlap => "overlapping extents",
            CorruptionKind::Unmerged => "contiguous extents not merged",
        };
        f.write_str(s)
    }
}

/// A broken invariant found by `ExtentMap::validate`. `neighbor` is the extent preceding
/// `extent` for the pairwise checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorruptionReport {
    pub kind: CorruptionKind,
    pub extent: Extent,
    pub neighbor: Option<Extent>,
}

impl CorruptionReport {
    pub(crate) fn single(kind: CorruptionKind, extent: Extent) -> Self {
        Self {
            kind,
            extent,
            neighbor: None,
        }
    }

    pub(crate) fn pair(kind: CorruptionKind, prev: Extent, extent: Extent) -> Self {
        Self {
            kind,
            extent,
            neighbor: Some(prev),
        }
    }
}

impl fmt::Display for CorruptionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "extent map corrupt, {}: {}", self.kind, self.extent)?;
        if let Some(prev) = self.neighbor {
            write!(f, ", prev: {}", prev)?;
        }
        Ok(())
    }
}

impl std::error::Error for CorruptionReport {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_names_both_extents() {
        let r = CorruptionReport::pair(
            CorruptionKind::Unmerged,
            Extent::new(0, 100, 10),
            Extent::new(10, 110, 5),
        );
        assert_eq!(
            r.to_string(),
            "extent map corrupt, contiguous extents not merged: (lba: 10 pba: 110 len: 5), \
             prev: (lba: 0 pba: 100 len: 10)"
        );

        let r = CorruptionReport::single(CorruptionKind::DuplicateLba, Extent::new(4, 9, 1));
        assert_eq!(
            r.to_string(),
            "extent map corrupt, lba present in two extents: (lba: 4 pba: 9 len: 1)"
        );
    }

    #[test]
    fn error_display() {
        let e = ExtentMapError::CapacityExhausted {
            limit: 2,
            required: 3,
        };
        assert_eq!(
            e.to_string(),
            "extent budget exhausted: update needs up to 3 extents, limit is 2"
        );
    }
}
