// Shared fixtures for disk integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use strata_core::SparseMemoryStream;
use strata_disks::{AllocationTable, DynamicBlockAllocator, SharedBlockSource};
use uuid::Uuid;

pub const BLOCK_SIZE: u32 = 512;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Writable in-memory image with every block unallocated.
pub fn memory_image(block_count: u64) -> DynamicBlockAllocator<SparseMemoryStream> {
    DynamicBlockAllocator::open(
        AllocationTable::new(block_count, BLOCK_SIZE),
        SparseMemoryStream::growable(),
        true,
        Uuid::new_v4(),
    )
}

pub fn child_of(parent: Uuid, block_count: u64) -> DynamicBlockAllocator<SparseMemoryStream> {
    memory_image(block_count).with_parent_identity(parent)
}

pub fn shared(image: DynamicBlockAllocator<SparseMemoryStream>) -> SharedBlockSource {
    Rc::new(RefCell::new(image))
}
