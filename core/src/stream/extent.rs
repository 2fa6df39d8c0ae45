// Extents: contiguous logical ranges tagged present or implicitly zero

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtentKind {
    Present,
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    pub offset: u64,
    pub length: u64,
    pub kind: ExtentKind,
}

impl Extent {
    pub fn present(offset: u64, length: u64) -> Self {
        Self {
            offset,
            length,
            kind: ExtentKind::Present,
        }
    }

    pub fn zero(offset: u64, length: u64) -> Self {
        Self {
            offset,
            length,
            kind: ExtentKind::Zero,
        }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    pub fn is_present(&self) -> bool {
        self.kind == ExtentKind::Present
    }

    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.offset && offset < self.end()
    }

    /// The part of this extent inside `[offset, offset + length)`.
    pub fn intersect(&self, offset: u64, length: u64) -> Option<Extent> {
        let start = self.offset.max(offset);
        let end = self.end().min(offset.saturating_add(length));
        if start < end {
            Some(Extent {
                offset: start,
                length: end - start,
                kind: self.kind,
            })
        } else {
            None
        }
    }

    /// Move the extent from a space whose origin is `from` to one whose origin is `to`.
    pub fn rebase(&self, from: u64, to: u64) -> Extent {
        Extent {
            offset: self.offset - from + to,
            length: self.length,
            kind: self.kind,
        }
    }
}

/// Sort and merge overlapping or adjacent extents of the same kind.
///
/// Where extents of different kinds overlap, present wins.
pub fn coalesce(extents: impl IntoIterator<Item = Extent>) -> Vec<Extent> {
    let mut present: Vec<Extent> = Vec::new();
    let mut sorted: Vec<Extent> = extents
        .into_iter()
        .filter(|e| e.length > 0 && e.is_present())
        .collect();
    sorted.sort_by_key(|e| e.offset);

    for extent in sorted {
        match present.last_mut() {
            Some(last) if extent.offset <= last.end() => {
                let end = last.end().max(extent.end());
                last.length = end - last.offset;
            }
            _ => present.push(extent),
        }
    }
    present
}

/// Restrict extents to `[offset, offset + length)`.
pub fn clip(extents: &[Extent], offset: u64, length: u64) -> Vec<Extent> {
    extents
        .iter()
        .filter_map(|e| e.intersect(offset, length))
        .collect()
}

/// Cover `[0, length)` completely: the given present extents plus explicit
/// zero extents for every gap.
pub fn fill_gaps(present: &[Extent], length: u64) -> Vec<Extent> {
    let mut layout = Vec::with_capacity(present.len() * 2 + 1);
    let mut cursor = 0u64;
    for extent in coalesce(clip(present, 0, length)) {
        if extent.offset > cursor {
            layout.push(Extent::zero(cursor, extent.offset - cursor));
        }
        cursor = extent.end();
        layout.push(extent);
    }
    if cursor < length {
        layout.push(Extent::zero(cursor, length - cursor));
    }
    layout
}

/// Total bytes covered by present extents.
pub fn present_bytes(extents: &[Extent]) -> u64 {
    extents.iter().filter(|e| e.is_present()).map(|e| e.length).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersect() {
        let extent = Extent::present(100, 50);
        assert_eq!(extent.intersect(0, 120), Some(Extent::present(100, 20)));
        assert_eq!(extent.intersect(140, 100), Some(Extent::present(140, 10)));
        assert_eq!(extent.intersect(150, 10), None);
        assert_eq!(extent.intersect(0, 100), None);
        assert!(extent.contains(149));
        assert!(!extent.contains(150));
    }

    #[test]
    fn test_coalesce_merges_adjacent_and_overlapping() {
        let merged = coalesce(vec![
            Extent::present(20, 10),
            Extent::present(0, 10),
            Extent::present(10, 5),
            Extent::present(25, 20),
            Extent::present(100, 0),
            Extent::zero(60, 10),
        ]);
        assert_eq!(merged, vec![Extent::present(0, 15), Extent::present(20, 25)]);
    }

    #[test]
    fn test_fill_gaps() {
        let layout = fill_gaps(&[Extent::present(10, 10), Extent::present(40, 100)], 50);
        assert_eq!(
            layout,
            vec![
                Extent::zero(0, 10),
                Extent::present(10, 10),
                Extent::zero(20, 20),
                Extent::present(40, 10),
            ]
        );
        assert_eq!(fill_gaps(&[], 8), vec![Extent::zero(0, 8)]);
        assert_eq!(present_bytes(&layout), 20);
    }
}
