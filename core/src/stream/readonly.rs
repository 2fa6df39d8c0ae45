// Read-only view of a stream

use super::{Extent, SparseStream};
use crate::StrataError;

/// Forwards reads and extent queries; every write is `Unwritable`.
#[derive(Debug, Clone)]
pub struct ReadOnlyStream<S> {
    inner: S,
}

impl<S: SparseStream> ReadOnlyStream<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: SparseStream> SparseStream for ReadOnlyStream<S> {
    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StrataError> {
        self.inner.read_at(offset, buf)
    }

    fn write_at(&mut self, _offset: u64, _data: &[u8]) -> Result<(), StrataError> {
        Err(StrataError::Unwritable("opened read-only".to_string()))
    }

    fn extents(&self) -> Vec<Extent> {
        self.inner.extents()
    }

    fn extents_in_range(&self, offset: u64, length: u64) -> Vec<Extent> {
        self.inner.extents_in_range(offset, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::SparseMemoryStream;

    #[test]
    fn test_writes_rejected() {
        let mut stream = ReadOnlyStream::new(SparseMemoryStream::from_bytes(b"data"));
        assert!(!stream.can_write());
        assert!(matches!(stream.write_at(0, b"x"), Err(StrataError::Unwritable(_))));
        assert!(matches!(stream.set_length(0), Err(StrataError::Unwritable(_))));
        assert_eq!(stream.read_vec(0, 4).unwrap(), b"data");
        assert_eq!(stream.into_inner().len(), 4);
    }
}
