// Block allocation table

use serde::{Deserialize, Serialize};
use strata_core::codec::{ByteReader, ByteWriter, Endian};
use strata_core::StrataError;

/// On-disk marker for an unallocated entry.
pub const UNALLOCATED_MARKER: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationEntry {
    Unallocated,
    /// Physical byte offset of the block in the backing store.
    Allocated(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationTable {
    block_size: u32,
    entries: Vec<AllocationEntry>,
}

impl AllocationTable {
    pub fn new(block_count: u64, block_size: u32) -> Self {
        Self {
            block_size,
            entries: vec![AllocationEntry::Unallocated; block_count as usize],
        }
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn block_count(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn get(&self, index: u64) -> Result<AllocationEntry, StrataError> {
        self.entries
            .get(index as usize)
            .copied()
            .ok_or(StrataError::OutOfRange {
                offset: index,
                length: 1,
                capacity: self.block_count(),
            })
    }

    /// Record `index` as stored at `physical`. Allocation is one-way: an
    /// allocated entry is never reassigned.
    pub fn allocate(&mut self, index: u64, physical: u64) -> Result<(), StrataError> {
        let capacity = self.block_count();
        let entry = self
            .entries
            .get_mut(index as usize)
            .ok_or(StrataError::OutOfRange {
                offset: index,
                length: 1,
                capacity,
            })?;
        match *entry {
            AllocationEntry::Unallocated => {
                *entry = AllocationEntry::Allocated(physical);
                Ok(())
            }
            AllocationEntry::Allocated(existing) => Err(StrataError::InvalidInput(format!(
                "block {} already allocated at offset {}",
                index, existing
            ))),
        }
    }

    pub fn allocated_count(&self) -> u64 {
        self.entries
            .iter()
            .filter(|e| matches!(e, AllocationEntry::Allocated(_)))
            .count() as u64
    }

    /// `(logical index, physical offset)` for every allocated block, ascending by index.
    pub fn allocated(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.entries.iter().enumerate().filter_map(|(index, entry)| match entry {
            AllocationEntry::Allocated(physical) => Some((index as u64, *physical)),
            AllocationEntry::Unallocated => None,
        })
    }

    /// Serialize as one u64 per entry.
    pub fn encode(&self, endian: Endian) -> Result<Vec<u8>, StrataError> {
        let mut bytes = vec![0u8; self.entries.len() * 8];
        let mut writer = ByteWriter::new(&mut bytes);
        for entry in &self.entries {
            let value = match entry {
                AllocationEntry::Allocated(physical) => *physical,
                AllocationEntry::Unallocated => UNALLOCATED_MARKER,
            };
            writer.write_u64(value, endian)?;
        }
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8], block_count: u64, block_size: u32, endian: Endian) -> Result<Self, StrataError> {
        let mut reader = ByteReader::new(bytes);
        let mut entries = Vec::with_capacity(block_count as usize);
        for _ in 0..block_count {
            let value = reader.read_u64(endian)?;
            entries.push(if value == UNALLOCATED_MARKER {
                AllocationEntry::Unallocated
            } else {
                AllocationEntry::Allocated(value)
            });
        }
        Ok(Self { block_size, entries })
    }
}
