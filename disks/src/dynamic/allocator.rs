// Block allocator over a backing store, with differencing-parent fallback

use super::allocation::{AllocationEntry, AllocationTable};
use log::{debug, trace};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use strata_core::config::DEFAULT_MAX_CHAIN_DEPTH;
use strata_core::{SparseStream, StrataError};
use uuid::Uuid;

/// One link of a differencing chain as seen by its children.
pub trait BlockSource {
    fn identity(&self) -> Uuid;

    fn block_size(&self) -> u32;

    /// Identity of the parent this image was created against, if any.
    fn parent_identity(&self) -> Option<Uuid>;

    fn parent(&self) -> Option<SharedBlockSource>;

    /// Attach the parent image. Fails with `InvalidChain` when its identity
    /// or block size does not match what this image expects.
    fn attach_parent(&mut self, parent: SharedBlockSource) -> Result<(), StrataError>;

    /// Read block `index` if this image stores it. Returns false, leaving
    /// `buf` untouched, when the block is unallocated here or lies past the
    /// end of this image (a parent may be smaller than its child).
    fn read_local_block(&mut self, index: u64, buf: &mut [u8]) -> Result<bool, StrataError>;

    /// Indices of blocks stored in this image only.
    fn local_blocks(&self) -> Vec<u64>;
}

pub type SharedBlockSource = Rc<RefCell<dyn BlockSource>>;

pub struct DynamicBlockAllocator<S> {
    table: AllocationTable,
    storage: S,
    writable: bool,
    identity: Uuid,
    parent_identity: Option<Uuid>,
    parent: Option<SharedBlockSource>,
    max_chain_depth: usize,
}

impl<S: SparseStream> DynamicBlockAllocator<S> {
    /// Fresh, writable image with every block unallocated. New blocks are
    /// appended to `storage`.
    pub fn create(storage: S, block_count: u64, block_size: u32) -> Result<Self, StrataError> {
        if !block_size.is_power_of_two() {
            return Err(StrataError::InvalidInput(format!(
                "block size {} is not a power of two",
                block_size
            )));
        }
        if !storage.can_write() {
            return Err(StrataError::Unwritable("backing store is read-only".to_string()));
        }
        Ok(Self::open(AllocationTable::new(block_count, block_size), storage, true, Uuid::new_v4()))
    }

    /// Existing image described by `table`, whose allocated blocks live in `storage`.
    pub fn open(table: AllocationTable, storage: S, writable: bool, identity: Uuid) -> Self {
        Self {
            table,
            storage,
            writable,
            identity,
            parent_identity: None,
            parent: None,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }

    /// Mark this image as a differencing child of `parent`.
    pub fn with_parent_identity(mut self, parent: Uuid) -> Self {
        self.parent_identity = Some(parent);
        self
    }

    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    pub fn table(&self) -> &AllocationTable {
        &self.table
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_parts(self) -> (AllocationTable, S) {
        (self.table, self.storage)
    }

    pub fn block_count(&self) -> u64 {
        self.table.block_count()
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    fn check_block(&self, buf_len: usize) -> Result<(), StrataError> {
        let expected = self.table.block_size() as u64;
        if buf_len as u64 != expected {
            return Err(StrataError::BlockSizeMismatch {
                expected,
                actual: buf_len as u64,
            });
        }
        Ok(())
    }

    /// Read logical block `index`: local data, else the nearest ancestor
    /// holding it, else zeros.
    pub fn read_block(&mut self, index: u64, buf: &mut [u8]) -> Result<(), StrataError> {
        self.check_block(buf.len())?;
        StrataError::check_range(index, 1, self.block_count())?;
        if self.read_local_block(index, buf)? {
            return Ok(());
        }

        let mut next = self.parent.clone();
        let mut depth = 0usize;
        while let Some(link) = next {
            depth += 1;
            if depth > self.max_chain_depth {
                return Err(StrataError::ChainTooDeep {
                    max_depth: self.max_chain_depth,
                });
            }
            // A link already borrowed further up the call stack means the chain loops.
            let mut source = link.try_borrow_mut().map_err(|_| StrataError::ChainTooDeep {
                max_depth: self.max_chain_depth,
            })?;
            trace!("Block {} falls through to parent {} (depth {})", index, source.identity(), depth);
            if source.read_local_block(index, buf)? {
                return Ok(());
            }
            next = source.parent();
        }
        buf.fill(0);
        Ok(())
    }

    /// Write a whole block, allocating it on first write.
    pub fn write_block(&mut self, index: u64, data: &[u8]) -> Result<(), StrataError> {
        if !self.writable {
            return Err(StrataError::Unwritable(format!("image {} opened read-only", self.identity)));
        }
        self.check_block(data.len())?;
        let physical = match self.table.get(index)? {
            AllocationEntry::Allocated(physical) => physical,
            AllocationEntry::Unallocated => self.allocate(index)?,
        };
        self.storage.write_at(physical, data)
    }

    fn allocate(&mut self, index: u64) -> Result<u64, StrataError> {
        let physical = self.storage.len();
        self.storage.set_length(physical + self.table.block_size() as u64)?;
        self.table.allocate(index, physical)?;
        debug!("Allocated block {} at offset {} in image {}", index, physical, self.identity);
        Ok(physical)
    }

    /// Blocks present anywhere in the chain.
    pub fn chain_blocks(&self) -> Result<BTreeSet<u64>, StrataError> {
        let mut blocks: BTreeSet<u64> = self.local_blocks().into_iter().collect();
        let mut next = self.parent.clone();
        let mut depth = 0usize;
        while let Some(link) = next {
            depth += 1;
            if depth > self.max_chain_depth {
                return Err(StrataError::ChainTooDeep {
                    max_depth: self.max_chain_depth,
                });
            }
            let source = link.try_borrow().map_err(|_| StrataError::ChainTooDeep {
                max_depth: self.max_chain_depth,
            })?;
            blocks.extend(source.local_blocks());
            next = source.parent();
        }
        Ok(blocks)
    }

    pub fn flush(&mut self) -> Result<(), StrataError> {
        self.storage.flush()
    }
}

impl<S: SparseStream> BlockSource for DynamicBlockAllocator<S> {
    fn identity(&self) -> Uuid {
        self.identity
    }

    fn block_size(&self) -> u32 {
        self.table.block_size()
    }

    fn parent_identity(&self) -> Option<Uuid> {
        self.parent_identity
    }

    fn parent(&self) -> Option<SharedBlockSource> {
        self.parent.clone()
    }

    fn attach_parent(&mut self, parent: SharedBlockSource) -> Result<(), StrataError> {
        let (identity, block_size) = {
            let source = parent.try_borrow().map_err(|_| {
                StrataError::InvalidChain(format!("image {} cannot be its own parent", self.identity))
            })?;
            (source.identity(), source.block_size())
        };
        match self.parent_identity {
            Some(expected) if expected == identity => {}
            Some(expected) => {
                return Err(StrataError::InvalidChain(format!(
                    "image {} expects parent {}, got {}",
                    self.identity, expected, identity
                )))
            }
            None => {
                return Err(StrataError::InvalidChain(format!(
                    "image {} is not a differencing image",
                    self.identity
                )))
            }
        }
        if block_size != self.table.block_size() {
            return Err(StrataError::InvalidChain(format!(
                "parent {} uses {} byte blocks, child {} uses {}",
                identity,
                block_size,
                self.identity,
                self.table.block_size()
            )));
        }
        debug!("Attached parent {} to image {}", identity, self.identity);
        self.parent = Some(parent);
        Ok(())
    }

    fn read_local_block(&mut self, index: u64, buf: &mut [u8]) -> Result<bool, StrataError> {
        if index >= self.table.block_count() {
            return Ok(false);
        }
        match self.table.get(index)? {
            AllocationEntry::Allocated(physical) => {
                self.storage.read_at(physical, buf)?;
                Ok(true)
            }
            AllocationEntry::Unallocated => Ok(false),
        }
    }

    fn local_blocks(&self) -> Vec<u64> {
        self.table.allocated().map(|(index, _)| index).collect()
    }
}
