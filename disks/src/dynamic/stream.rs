// Byte-addressed view of a dynamic disk

use super::allocator::DynamicBlockAllocator;
use log::warn;
use strata_core::stream::extent;
use strata_core::{Extent, SparseStream, StrataError};

/// A [`DynamicBlockAllocator`] presented as a [`SparseStream`].
///
/// Partial-block writes read the current block through the chain, patch
/// it, and write the whole block into this image.
pub struct DynamicDiskStream<S> {
    allocator: DynamicBlockAllocator<S>,
    length: u64,
    scratch: Vec<u8>,
}

impl<S: SparseStream> DynamicDiskStream<S> {
    /// `length` may be shorter than the block-rounded capacity of the table.
    pub fn new(allocator: DynamicBlockAllocator<S>, length: u64) -> Result<Self, StrataError> {
        let block_size = allocator.table().block_size();
        let capacity = allocator.block_count() * block_size as u64;
        if length > capacity {
            return Err(StrataError::InvalidInput(format!(
                "disk length {} exceeds {} blocks of {} bytes",
                length,
                allocator.block_count(),
                block_size
            )));
        }
        Ok(Self {
            allocator,
            length,
            scratch: vec![0u8; block_size as usize],
        })
    }

    /// Present extents across the whole chain.
    pub fn try_extents(&self) -> Result<Vec<Extent>, StrataError> {
        let blocks = self.allocator.chain_blocks()?;
        Ok(self.block_extents(blocks))
    }

    fn block_extents(&self, blocks: impl IntoIterator<Item = u64>) -> Vec<Extent> {
        let block_size = self.block_size();
        let present = blocks
            .into_iter()
            .map(|index| Extent::present(index * block_size, block_size));
        extent::clip(&extent::coalesce(present), 0, self.length)
    }

    pub fn allocator(&self) -> &DynamicBlockAllocator<S> {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut DynamicBlockAllocator<S> {
        &mut self.allocator
    }

    pub fn into_allocator(self) -> DynamicBlockAllocator<S> {
        self.allocator
    }

    fn block_size(&self) -> u64 {
        self.scratch.len() as u64
    }
}

impl<S: SparseStream> SparseStream for DynamicDiskStream<S> {
    fn len(&self) -> u64 {
        self.length
    }

    fn can_write(&self) -> bool {
        self.allocator.is_writable()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StrataError> {
        StrataError::check_range(offset, buf.len() as u64, self.length)?;
        let block_size = self.block_size();
        let mut done = 0usize;
        while done < buf.len() {
            let position = offset + done as u64;
            let block = position / block_size;
            let within = (position % block_size) as usize;
            let count = (block_size as usize - within).min(buf.len() - done);
            self.allocator.read_block(block, &mut self.scratch)?;
            buf[done..done + count].copy_from_slice(&self.scratch[within..within + count]);
            done += count;
        }
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), StrataError> {
        if !self.allocator.is_writable() {
            return Err(StrataError::Unwritable("dynamic disk opened read-only".to_string()));
        }
        StrataError::check_range(offset, data.len() as u64, self.length)?;
        let block_size = self.block_size();
        let mut done = 0usize;
        while done < data.len() {
            let position = offset + done as u64;
            let block = position / block_size;
            let within = (position % block_size) as usize;
            let count = (block_size as usize - within).min(data.len() - done);
            if count == block_size as usize {
                self.allocator.write_block(block, &data[done..done + count])?;
            } else {
                self.allocator.read_block(block, &mut self.scratch)?;
                self.scratch[within..within + count].copy_from_slice(&data[done..done + count]);
                self.allocator.write_block(block, &self.scratch)?;
            }
            done += count;
        }
        Ok(())
    }

    /// Extents of a chain that could not be walked are best-effort: only
    /// blocks stored in this image are reported. Use [`Self::try_extents`]
    /// where a broken chain must fail, e.g. before building an image.
    fn extents(&self) -> Vec<Extent> {
        match self.try_extents() {
            Ok(extents) => extents,
            Err(e) => {
                warn!("Reporting local extents only: {}", e);
                self.block_extents(self.allocator.table().allocated().map(|(index, _)| index))
            }
        }
    }

    fn flush(&mut self) -> Result<(), StrataError> {
        self.allocator.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::allocator::{BlockSource, SharedBlockSource};
    use std::cell::RefCell;
    use std::rc::Rc;
    use strata_core::SparseMemoryStream;
    use uuid::Uuid;

    fn disk(blocks: u64) -> DynamicDiskStream<SparseMemoryStream> {
        let allocator = DynamicBlockAllocator::create(SparseMemoryStream::growable(), blocks, 512).unwrap();
        DynamicDiskStream::new(allocator, blocks * 512).unwrap()
    }

    #[test]
    fn test_partial_write_spanning_blocks() {
        let mut disk = disk(4);
        disk.write_at(500, &[3; 24]).unwrap();
        assert_eq!(disk.allocator().table().allocated_count(), 2);
        assert_eq!(disk.extents(), vec![Extent::present(0, 1024)]);

        let data = disk.read_vec(490, 40).unwrap();
        assert_eq!(&data[..10], &[0; 10]);
        assert_eq!(&data[10..34], &[3; 24]);
        assert_eq!(&data[34..], &[0; 6]);
    }

    #[test]
    fn test_child_copies_on_write() {
        let mut base = DynamicBlockAllocator::create(SparseMemoryStream::growable(), 4, 512).unwrap();
        base.write_block(1, &[0xAA; 512]).unwrap();
        let base_id = base.identity();
        let base: SharedBlockSource = Rc::new(RefCell::new(base));

        let child = DynamicBlockAllocator::open(
            crate::dynamic::AllocationTable::new(4, 512),
            SparseMemoryStream::growable(),
            true,
            Uuid::new_v4(),
        )
        .with_parent_identity(base_id);
        let mut child = DynamicDiskStream::new(child, 2048).unwrap();
        child.allocator_mut().attach_parent(base.clone()).unwrap();

        child.write_at(512 + 4, b"new").unwrap();
        let block = child.read_vec(512, 512).unwrap();
        assert_eq!(&block[..4], &[0xAA; 4]);
        assert_eq!(&block[4..7], b"new");
        assert_eq!(&block[7..], &[0xAA; 505][..]);

        // The parent is untouched.
        let mut original = vec![0; 512];
        assert!(base.borrow_mut().read_local_block(1, &mut original).unwrap());
        assert_eq!(original, vec![0xAA; 512]);
        assert_eq!(child.extents(), vec![Extent::present(512, 512)]);
    }

    #[test]
    fn test_read_only_and_length_checks() {
        let allocator = DynamicBlockAllocator::create(SparseMemoryStream::growable(), 2, 512).unwrap();
        assert!(matches!(
            DynamicDiskStream::new(allocator, 2000),
            Err(StrataError::InvalidInput(_))
        ));

        let mut short = disk(2);
        assert!(matches!(short.read_vec(1000, 100), Err(StrataError::OutOfRange { .. })));

        let (table, storage) = short.into_allocator().into_parts();
        let read_only = DynamicBlockAllocator::open(table, storage, false, Uuid::new_v4());
        let mut read_only = DynamicDiskStream::new(read_only, 1024).unwrap();
        assert!(!read_only.can_write());
        assert!(matches!(read_only.write_at(0, b"x"), Err(StrataError::Unwritable(_))));
    }

    #[test]
    fn test_broken_chain_extents() {
        let a = DynamicBlockAllocator::create(SparseMemoryStream::growable(), 4, 512).unwrap();
        let b = DynamicBlockAllocator::create(SparseMemoryStream::growable(), 4, 512).unwrap();
        let (a_id, b_id) = (a.identity(), b.identity());
        let a: SharedBlockSource = Rc::new(RefCell::new(a.with_parent_identity(b_id)));
        let b: SharedBlockSource = Rc::new(RefCell::new(b.with_parent_identity(a_id)));
        a.borrow_mut().attach_parent(b.clone()).unwrap();
        b.borrow_mut().attach_parent(a.clone()).unwrap();

        let mut leaf = DynamicBlockAllocator::create(SparseMemoryStream::growable(), 4, 512)
            .unwrap()
            .with_parent_identity(a_id);
        leaf.attach_parent(a).unwrap();
        leaf.write_block(2, &[1; 512]).unwrap();
        let leaf = DynamicDiskStream::new(leaf, 2048).unwrap();

        assert!(matches!(leaf.try_extents(), Err(StrataError::ChainTooDeep { max_depth: 16 })));
        assert_eq!(leaf.extents(), vec![Extent::present(1024, 512)]);
    }
}
