pub mod container;
pub mod dynamic;
pub mod raw;

pub use container::{ContainerRegistry, DiskContainerPlugin, FileAccess, VirtualDisk};
pub use dynamic::{
    AllocationEntry, AllocationTable, BlockSource, BuildReport, BuiltImage, DynamicBlockAllocator,
    DynamicDiskStream, DynamicImageBuilder, ImageCatalog, SharedBlockSource,
};
pub use raw::RawContainer;
pub use strata_core::StrataError;
