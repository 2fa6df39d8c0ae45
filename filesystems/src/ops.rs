// Object-safe operations on a mounted filesystem
// Every mounted filesystem, whatever its driver types, is used through
// `FilesystemOps`. Paths are '/'-separated and relative to the mount root.

use serde::{Deserialize, Serialize};
use strata_core::{SparseStream, StrataError};

/// File attributes returned by stat operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttributes {
    pub size: u64,
    pub is_directory: bool,
    pub is_file: bool,
    pub is_symlink: bool,
    pub created: Option<u64>,  // Unix timestamp
    pub modified: Option<u64>, // Unix timestamp
    pub accessed: Option<u64>, // Unix timestamp
    pub permissions: u32,
    pub owner: Option<u32>,
    pub group: Option<u32>,
}

impl FileAttributes {
    pub fn file(size: u64) -> Self {
        Self {
            size,
            is_file: true,
            permissions: 0o644,
            ..Self::default()
        }
    }

    pub fn directory() -> Self {
        Self {
            is_directory: true,
            permissions: 0o755,
            ..Self::default()
        }
    }
}

/// Directory entry returned by readdir operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub attributes: FileAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemInfo {
    pub total_space: u64,
    pub free_space: u64,
    pub available_space: u64,
    pub total_inodes: u64,
    pub free_inodes: u64,
    pub block_size: u32,
    pub max_filename_length: u32,
    pub filesystem_type: String,
    pub volume_label: Option<String>,
    pub volume_uuid: Option<String>,
    pub is_readonly: bool,
}

pub trait FilesystemOps {
    /// Filesystem type name, e.g. "fat32"
    fn filesystem_type(&self) -> &str;

    fn statfs(&mut self) -> Result<FilesystemInfo, StrataError>;

    fn stat(&mut self, path: &str) -> Result<FileAttributes, StrataError>;

    fn readdir(&mut self, path: &str) -> Result<Vec<DirectoryEntry>, StrataError>;

    /// Read up to `size` bytes; short at end of file, empty past it.
    fn read(&mut self, path: &str, offset: u64, size: u32) -> Result<Vec<u8>, StrataError>;

    fn write(&mut self, _path: &str, _offset: u64, _data: &[u8]) -> Result<u32, StrataError> {
        Err(StrataError::NotSupported("Filesystem is read-only".to_string()))
    }

    /// Byte-range handle on a file's content.
    fn open_file(&mut self, path: &str) -> Result<Box<dyn SparseStream>, StrataError>;

    fn is_readonly(&self) -> bool {
        true
    }

    /// Release cached state. Further calls fail with `Closed`.
    fn close(&mut self) -> Result<(), StrataError>;
}

/// Split a path into its components, ignoring empty and "." segments.
pub fn path_components(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect()
}

/// Presents a directory of another mounted filesystem as its root.
pub struct SubfolderView {
    inner: Box<dyn FilesystemOps>,
    base_path: String,
}

impl SubfolderView {
    pub fn new(mut inner: Box<dyn FilesystemOps>, base_path: &str) -> Result<Self, StrataError> {
        let attrs = inner.stat(base_path)?;
        if !attrs.is_directory {
            return Err(StrataError::NotADirectory(base_path.to_string()));
        }
        Ok(Self {
            inner,
            base_path: path_components(base_path).join("/"),
        })
    }

    fn to_internal_path(&self, path: &str) -> String {
        let relative = path_components(path).join("/");
        match (self.base_path.is_empty(), relative.is_empty()) {
            (true, _) => relative,
            (false, true) => self.base_path.clone(),
            (false, false) => format!("{}/{}", self.base_path, relative),
        }
    }

    pub fn into_inner(self) -> Box<dyn FilesystemOps> {
        self.inner
    }
}

impl FilesystemOps for SubfolderView {
    fn filesystem_type(&self) -> &str {
        self.inner.filesystem_type()
    }

    fn statfs(&mut self) -> Result<FilesystemInfo, StrataError> {
        let mut info = self.inner.statfs()?;
        info.filesystem_type = format!("{} (subfolder)", info.filesystem_type);
        Ok(info)
    }

    fn stat(&mut self, path: &str) -> Result<FileAttributes, StrataError> {
        let internal_path = self.to_internal_path(path);
        self.inner.stat(&internal_path)
    }

    fn readdir(&mut self, path: &str) -> Result<Vec<DirectoryEntry>, StrataError> {
        let internal_path = self.to_internal_path(path);
        self.inner.readdir(&internal_path)
    }

    fn read(&mut self, path: &str, offset: u64, size: u32) -> Result<Vec<u8>, StrataError> {
        let internal_path = self.to_internal_path(path);
        self.inner.read(&internal_path, offset, size)
    }

    fn write(&mut self, path: &str, offset: u64, data: &[u8]) -> Result<u32, StrataError> {
        let internal_path = self.to_internal_path(path);
        self.inner.write(&internal_path, offset, data)
    }

    fn open_file(&mut self, path: &str) -> Result<Box<dyn SparseStream>, StrataError> {
        let internal_path = self.to_internal_path(path);
        self.inner.open_file(&internal_path)
    }

    fn is_readonly(&self) -> bool {
        self.inner.is_readonly()
    }

    fn close(&mut self) -> Result<(), StrataError> {
        self.inner.close()
    }
}
