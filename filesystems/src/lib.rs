// Virtual filesystem dispatch
// Plugins supply concrete entry, file, directory and context types; this
// crate resolves paths over them, memoizes node wrappers by cache id, and
// exposes every mounted filesystem through one object-safe trait.

pub mod dispatch;
pub mod driver;
pub mod ops;
pub mod registry;

pub use dispatch::{DirectoryNode, FileNode, Node, VfsFileSystem};
pub use driver::{VfsDirEntry, VfsDirectory, VfsDriver, VfsFile};
pub use ops::{DirectoryEntry, FileAttributes, FilesystemInfo, FilesystemOps, SubfolderView};
pub use registry::{FileSystemDescriptor, FileSystemOpener, FileSystemPlugin, FileSystemRegistry, OpenParameters};
pub use strata_core::StrataError;
