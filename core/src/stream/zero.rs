// Fixed-length stream with no present extents

use super::{Extent, SparseStream};
use crate::StrataError;

/// Placeholder content source: every byte reads as zero.
#[derive(Debug, Clone, Copy)]
pub struct ZeroStream {
    length: u64,
}

impl ZeroStream {
    pub fn new(length: u64) -> Self {
        Self { length }
    }
}

impl SparseStream for ZeroStream {
    fn len(&self) -> u64 {
        self.length
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StrataError> {
        StrataError::check_range(offset, buf.len() as u64, self.length)?;
        buf.fill(0);
        Ok(())
    }

    fn extents(&self) -> Vec<Extent> {
        Vec::new()
    }
}
