// Filesystem driver contract
//
// A driver names four types: the directory entry handle, the file and
// directory abstractions opened from entries, and a context holding whatever
// state the driver needs (volume stream, superblock, caches). The dispatcher
// owns the context and lends it to every call.

use crate::ops::{FileAttributes, FilesystemInfo};
use strata_core::{SparseStream, StrataError};

/// Handle on one object of a filesystem.
pub trait VfsDirEntry: Clone {
    fn name(&self) -> &str;

    fn is_directory(&self) -> bool;

    /// Equal for every lookup of the same underlying object.
    fn unique_cache_id(&self) -> u64;

    fn attributes(&self) -> FileAttributes;
}

pub trait VfsDirectory {
    type Context;
    type Entry: VfsDirEntry;

    fn entries(&mut self, context: &mut Self::Context) -> Result<Vec<Self::Entry>, StrataError>;

    /// Child named `name`, or `None`. The default scans `entries`.
    fn find(
        &mut self,
        context: &mut Self::Context,
        name: &str,
        case_sensitive: bool,
    ) -> Result<Option<Self::Entry>, StrataError> {
        let entries = self.entries(context)?;
        Ok(entries.into_iter().find(|entry| {
            if case_sensitive {
                entry.name() == name
            } else {
                entry.name().eq_ignore_ascii_case(name)
            }
        }))
    }
}

pub trait VfsFile {
    type Context;

    fn length(&self) -> u64;

    /// Stream over the file content. Writes through it change the file.
    fn open_stream(&mut self, context: &mut Self::Context) -> Result<Box<dyn SparseStream>, StrataError>;
}

pub trait VfsDriver {
    type Context;
    type Entry: VfsDirEntry;
    type File: VfsFile<Context = Self::Context>;
    type Directory: VfsDirectory<Context = Self::Context, Entry = Self::Entry>;

    fn filesystem_type(&self) -> &str;

    fn root(&self, context: &mut Self::Context) -> Result<Self::Entry, StrataError>;

    fn open_directory(&self, context: &mut Self::Context, entry: &Self::Entry) -> Result<Self::Directory, StrataError>;

    fn open_file(&self, context: &mut Self::Context, entry: &Self::Entry) -> Result<Self::File, StrataError>;

    fn statfs(&self, context: &mut Self::Context) -> Result<FilesystemInfo, StrataError>;

    /// Whether name lookups are case sensitive unless the mount overrides it.
    fn case_sensitive(&self) -> bool {
        false
    }

    fn is_readonly(&self) -> bool {
        true
    }
}
