// Byte-range view over a parent stream

use super::{Extent, SparseStream};
use crate::StrataError;

/// Exposes `[start, start + length)` of `parent` as a stream of its own.
///
/// Used for logical volumes over a disk and for builder extents that refer
/// to part of a shared content stream.
#[derive(Debug, Clone)]
pub struct SubStream<S> {
    parent: S,
    start: u64,
    length: u64,
}

impl<S: SparseStream> SubStream<S> {
    pub fn new(parent: S, start: u64, length: u64) -> Result<Self, StrataError> {
        StrataError::check_range(start, length, parent.len())?;
        Ok(Self {
            parent,
            start,
            length,
        })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn into_inner(self) -> S {
        self.parent
    }
}

impl<S: SparseStream> SparseStream for SubStream<S> {
    fn len(&self) -> u64 {
        self.length
    }

    fn can_write(&self) -> bool {
        self.parent.can_write()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StrataError> {
        StrataError::check_range(offset, buf.len() as u64, self.length)?;
        self.parent.read_at(self.start + offset, buf)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), StrataError> {
        StrataError::check_range(offset, data.len() as u64, self.length)?;
        self.parent.write_at(self.start + offset, data)
    }

    fn extents(&self) -> Vec<Extent> {
        self.parent
            .extents_in_range(self.start, self.length)
            .into_iter()
            .map(|e| e.rebase(self.start, 0))
            .collect()
    }

    fn flush(&mut self) -> Result<(), StrataError> {
        self.parent.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{share, SparseMemoryStream};

    #[test]
    fn test_view_translates_offsets() {
        let disk = share(SparseMemoryStream::new(4096));
        disk.borrow_mut().write_at(1024, b"partition").unwrap();
        disk.borrow_mut().write_at(3000, b"outside").unwrap();

        let mut view = SubStream::new(disk.clone(), 1024, 1024).unwrap();
        assert_eq!(view.read_vec(0, 9).unwrap(), b"partition");
        assert_eq!(view.extents(), vec![Extent::present(0, 9)]);

        view.write_at(100, b"!").unwrap();
        assert_eq!(disk.borrow_mut().read_vec(1124, 1).unwrap(), b"!");

        assert!(matches!(view.read_vec(1000, 100), Err(StrataError::OutOfRange { .. })));
        assert!(matches!(view.write_at(1024, b"x"), Err(StrataError::OutOfRange { .. })));
    }

    #[test]
    fn test_view_must_fit_parent() {
        let disk = share(SparseMemoryStream::new(100));
        assert!(SubStream::new(disk, 50, 51).is_err());
    }
}
