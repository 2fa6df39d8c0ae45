// Dynamic (growable) and differencing disk images
//
// Payload is split into fixed-size blocks; an allocation table maps each
// logical block to a physical offset in the backing store, or marks it
// unallocated. Unallocated blocks read from the parent image when one is
// attached, otherwise as zeros.

pub mod allocation;
pub mod allocator;
pub mod builder;
pub mod chain;
pub mod stream;

pub use allocation::{AllocationEntry, AllocationTable};
pub use allocator::{BlockSource, DynamicBlockAllocator, SharedBlockSource};
pub use builder::{BuildReport, BuiltImage, DynamicImageBuilder};
pub use chain::ImageCatalog;
pub use stream::DynamicDiskStream;
