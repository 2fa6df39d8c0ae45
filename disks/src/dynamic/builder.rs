// Build pipeline: sparse content stream -> allocation table + block payload
//
// Only blocks touched by a present extent of the content are emitted, so the
// output stays as sparse as the input. Partial blocks at extent edges are
// zero padded.

use super::allocation::AllocationTable;
use super::allocator::DynamicBlockAllocator;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strata_core::codec::Endian;
use strata_core::stream::{BuilderExtent, StreamExtent};
use strata_core::{BuiltStream, SharedStream, SparseStream, StrataError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub block_size: u32,
    pub block_count: u64,
    pub allocated_blocks: u64,
    /// Logical bytes left unallocated because no extent covered them.
    pub zero_bytes_skipped: u64,
}

/// Output of [`DynamicImageBuilder::build`]. The payload holds the allocated
/// blocks back to back, in ascending logical order, at the offsets the table
/// records.
pub struct BuiltImage {
    pub table: AllocationTable,
    pub payload: BuiltStream,
    pub report: BuildReport,
}

impl BuiltImage {
    pub fn table_bytes(&self, endian: Endian) -> Result<Vec<u8>, StrataError> {
        self.table.encode(endian)
    }
}

#[derive(Debug, Clone)]
pub struct DynamicImageBuilder {
    block_size: u32,
}

impl DynamicImageBuilder {
    pub fn new(block_size: u32) -> Result<Self, StrataError> {
        if block_size == 0 || !block_size.is_power_of_two() {
            return Err(StrataError::InvalidInput(format!(
                "block size {} is not a power of two",
                block_size
            )));
        }
        Ok(Self { block_size })
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Block indices touched by any present extent of `content`.
    fn touched_blocks(&self, content: &dyn SparseStream) -> BTreeSet<u64> {
        let block_size = self.block_size as u64;
        let mut blocks = BTreeSet::new();
        for extent in content.extents().iter().filter(|e| e.is_present() && e.length > 0) {
            blocks.extend(extent.offset / block_size..=(extent.end() - 1) / block_size);
        }
        blocks
    }

    fn report(&self, length: u64, blocks: &BTreeSet<u64>) -> BuildReport {
        let block_size = self.block_size as u64;
        let block_count = length.div_ceil(block_size);
        let stored: u64 = blocks
            .iter()
            .map(|&index| block_size.min(length.saturating_sub(index * block_size)))
            .sum();
        BuildReport {
            block_size: self.block_size,
            block_count,
            allocated_blocks: blocks.len() as u64,
            zero_bytes_skipped: length - stored,
        }
    }

    /// Lay out `content` without copying it: the payload reads through to
    /// the content stream on demand.
    pub fn build(&self, content: SharedStream) -> Result<BuiltImage, StrataError> {
        let length = content.borrow().len();
        let blocks = self.touched_blocks(&*content.borrow());
        let report = self.report(length, &blocks);
        let block_size = self.block_size as u64;

        let mut table = AllocationTable::new(report.block_count, self.block_size);
        let mut pieces: Vec<Box<dyn BuilderExtent>> = Vec::with_capacity(blocks.len());
        let mut physical = 0u64;
        for &index in &blocks {
            table.allocate(index, physical)?;
            pieces.push(Box::new(StreamExtent::new(
                physical,
                content.clone(),
                index * block_size,
                block_size,
            )));
            physical += block_size;
        }
        let payload = BuiltStream::new(physical, pieces)?;

        info!(
            "Built dynamic image: {} of {} blocks allocated, {} zero bytes skipped",
            report.allocated_blocks, report.block_count, report.zero_bytes_skipped
        );
        Ok(BuiltImage {
            table,
            payload,
            report,
        })
    }

    /// Copy `content` into a fresh allocator over `storage`.
    pub fn build_into<S: SparseStream>(
        &self,
        content: &mut dyn SparseStream,
        storage: S,
    ) -> Result<(DynamicBlockAllocator<S>, BuildReport), StrataError> {
        let length = content.len();
        let blocks = self.touched_blocks(content);
        let report = self.report(length, &blocks);
        let block_size = self.block_size as u64;

        let mut allocator = DynamicBlockAllocator::create(storage, report.block_count, self.block_size)?;
        let mut block = vec![0u8; self.block_size as usize];
        for &index in &blocks {
            let start = index * block_size;
            let available = block_size.min(length - start) as usize;
            block.fill(0);
            content.read_at(start, &mut block[..available])?;
            allocator.write_block(index, &block)?;
        }
        debug!("Copied {} blocks into new image", blocks.len());
        Ok((allocator, report))
    }
}
