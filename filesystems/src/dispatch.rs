// Generic mounted filesystem
//
// Path resolution walks from the root entry one component at a time through
// the driver's directory abstraction. File and directory wrappers are
// memoized by the entry's cache id, so resolving the same object twice yields
// the same `Rc`. The memo is dropped only when the filesystem is closed.

use crate::driver::{VfsDirEntry, VfsDirectory, VfsDriver, VfsFile};
use crate::ops::{path_components, DirectoryEntry, FileAttributes, FilesystemInfo, FilesystemOps};
use crate::registry::OpenParameters;
use log::{info, trace};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use strata_core::{ReadOnlyStream, SparseStream, StrataError};

pub struct FileNode<D: VfsDriver> {
    entry: D::Entry,
    file: RefCell<D::File>,
}

impl<D: VfsDriver> FileNode<D> {
    pub fn entry(&self) -> &D::Entry {
        &self.entry
    }

    pub fn length(&self) -> u64 {
        self.file.borrow().length()
    }
}

pub struct DirectoryNode<D: VfsDriver> {
    entry: D::Entry,
    directory: RefCell<D::Directory>,
}

impl<D: VfsDriver> DirectoryNode<D> {
    pub fn entry(&self) -> &D::Entry {
        &self.entry
    }
}

/// A memoized wrapper for one resolved entry.
pub enum Node<D: VfsDriver> {
    File(Rc<FileNode<D>>),
    Directory(Rc<DirectoryNode<D>>),
}

impl<D: VfsDriver> Node<D> {
    pub fn entry(&self) -> &D::Entry {
        match self {
            Node::File(node) => &node.entry,
            Node::Directory(node) => &node.entry,
        }
    }

    pub fn unique_cache_id(&self) -> u64 {
        self.entry().unique_cache_id()
    }

    /// True when both wrap the very same node instance.
    pub fn ptr_eq(&self, other: &Node<D>) -> bool {
        match (self, other) {
            (Node::File(a), Node::File(b)) => Rc::ptr_eq(a, b),
            (Node::Directory(a), Node::Directory(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<D: VfsDriver> Clone for Node<D> {
    fn clone(&self) -> Self {
        match self {
            Node::File(node) => Node::File(node.clone()),
            Node::Directory(node) => Node::Directory(node.clone()),
        }
    }
}

impl<D: VfsDriver> PartialEq for Node<D> {
    fn eq(&self, other: &Self) -> bool {
        self.unique_cache_id() == other.unique_cache_id()
    }
}

pub struct VfsFileSystem<D: VfsDriver> {
    driver: D,
    context: D::Context,
    root: D::Entry,
    case_sensitive: bool,
    read_only: bool,
    nodes: HashMap<u64, Node<D>>,
    closed: bool,
}

impl<D: VfsDriver> VfsFileSystem<D> {
    pub fn mount(driver: D, mut context: D::Context, params: &OpenParameters) -> Result<Self, StrataError> {
        let root = driver.root(&mut context)?;
        if !root.is_directory() {
            return Err(StrataError::NotADirectory("/".to_string()));
        }
        let case_sensitive = params.case_sensitive.unwrap_or_else(|| driver.case_sensitive());
        let read_only = params.read_only || driver.is_readonly();
        info!(
            "Mounted {} filesystem (case sensitive: {}, read-only: {})",
            driver.filesystem_type(),
            case_sensitive,
            read_only
        );
        Ok(Self {
            driver,
            context,
            root,
            case_sensitive,
            read_only,
            nodes: HashMap::new(),
            closed: false,
        })
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn context(&self) -> &D::Context {
        &self.context
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of memoized file and directory wrappers.
    pub fn cached_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn ensure_open(&self) -> Result<(), StrataError> {
        if self.closed {
            return Err(StrataError::Closed(format!(
                "{} filesystem has been closed",
                self.driver.filesystem_type()
            )));
        }
        Ok(())
    }

    fn directory_node(&mut self, entry: &D::Entry) -> Result<Rc<DirectoryNode<D>>, StrataError> {
        let id = entry.unique_cache_id();
        if let Some(Node::Directory(node)) = self.nodes.get(&id) {
            return Ok(node.clone());
        }
        let directory = self.driver.open_directory(&mut self.context, entry)?;
        let node = Rc::new(DirectoryNode {
            entry: entry.clone(),
            directory: RefCell::new(directory),
        });
        trace!("Cached directory {} ({})", entry.name(), id);
        self.nodes.insert(id, Node::Directory(node.clone()));
        Ok(node)
    }

    fn file_node(&mut self, entry: &D::Entry) -> Result<Rc<FileNode<D>>, StrataError> {
        let id = entry.unique_cache_id();
        if let Some(Node::File(node)) = self.nodes.get(&id) {
            return Ok(node.clone());
        }
        let file = self.driver.open_file(&mut self.context, entry)?;
        let node = Rc::new(FileNode {
            entry: entry.clone(),
            file: RefCell::new(file),
        });
        trace!("Cached file {} ({})", entry.name(), id);
        self.nodes.insert(id, Node::File(node.clone()));
        Ok(node)
    }

    /// Entry at `path`. Fails with `NotFound` on a missing component and
    /// `NotADirectory` when an intermediate component is a file.
    pub fn resolve(&mut self, path: &str) -> Result<D::Entry, StrataError> {
        self.ensure_open()?;
        let mut current = self.root.clone();
        let mut walked = String::new();
        for component in path_components(path) {
            if !current.is_directory() {
                return Err(StrataError::NotADirectory(walked));
            }
            let directory = self.directory_node(&current)?;
            walked.push('/');
            walked.push_str(component);
            let child = directory
                .directory
                .borrow_mut()
                .find(&mut self.context, component, self.case_sensitive)?;
            current = child.ok_or_else(|| StrataError::NotFound(walked.clone()))?;
        }
        Ok(current)
    }

    pub fn node(&mut self, path: &str) -> Result<Node<D>, StrataError> {
        let entry = self.resolve(path)?;
        if entry.is_directory() {
            Ok(Node::Directory(self.directory_node(&entry)?))
        } else {
            Ok(Node::File(self.file_node(&entry)?))
        }
    }

    pub fn directory(&mut self, path: &str) -> Result<Rc<DirectoryNode<D>>, StrataError> {
        let entry = self.resolve(path)?;
        if !entry.is_directory() {
            return Err(StrataError::NotADirectory(path.to_string()));
        }
        self.directory_node(&entry)
    }

    pub fn file(&mut self, path: &str) -> Result<Rc<FileNode<D>>, StrataError> {
        let entry = self.resolve(path)?;
        if entry.is_directory() {
            return Err(StrataError::InvalidInput(format!("{} is a directory", path)));
        }
        self.file_node(&entry)
    }

    pub fn list(&mut self, path: &str) -> Result<Vec<D::Entry>, StrataError> {
        let node = self.directory(path)?;
        let entries = node.directory.borrow_mut().entries(&mut self.context)?;
        Ok(entries)
    }

    /// Content stream of the file at `path`; write-protected on read-only mounts.
    pub fn open_stream(&mut self, path: &str) -> Result<Box<dyn SparseStream>, StrataError> {
        let node = self.file(path)?;
        let stream = node.file.borrow_mut().open_stream(&mut self.context)?;
        if self.read_only {
            Ok(Box::new(ReadOnlyStream::new(stream)))
        } else {
            Ok(stream)
        }
    }
}

impl<D: VfsDriver> FilesystemOps for VfsFileSystem<D> {
    fn filesystem_type(&self) -> &str {
        self.driver.filesystem_type()
    }

    fn statfs(&mut self) -> Result<FilesystemInfo, StrataError> {
        self.ensure_open()?;
        let mut info = self.driver.statfs(&mut self.context)?;
        info.is_readonly |= self.read_only;
        Ok(info)
    }

    fn stat(&mut self, path: &str) -> Result<FileAttributes, StrataError> {
        Ok(self.resolve(path)?.attributes())
    }

    fn readdir(&mut self, path: &str) -> Result<Vec<DirectoryEntry>, StrataError> {
        Ok(self
            .list(path)?
            .into_iter()
            .map(|entry| DirectoryEntry {
                name: entry.name().to_string(),
                attributes: entry.attributes(),
            })
            .collect())
    }

    fn read(&mut self, path: &str, offset: u64, size: u32) -> Result<Vec<u8>, StrataError> {
        let mut stream = self.open_stream(path)?;
        let length = stream.len();
        if offset >= length {
            return Ok(Vec::new());
        }
        let count = (length - offset).min(size as u64) as usize;
        stream.read_vec(offset, count)
    }

    fn write(&mut self, path: &str, offset: u64, data: &[u8]) -> Result<u32, StrataError> {
        if self.read_only {
            return Err(StrataError::Unwritable(format!("{} is mounted read-only", path)));
        }
        let mut stream = self.open_stream(path)?;
        stream.write_at(offset, data)?;
        stream.flush()?;
        Ok(data.len() as u32)
    }

    fn open_file(&mut self, path: &str) -> Result<Box<dyn SparseStream>, StrataError> {
        self.open_stream(path)
    }

    fn is_readonly(&self) -> bool {
        self.read_only
    }

    fn close(&mut self) -> Result<(), StrataError> {
        self.ensure_open()?;
        info!(
            "Closing {} filesystem, dropping {} cached nodes",
            self.driver.filesystem_type(),
            self.nodes.len()
        );
        self.nodes.clear();
        self.closed = true;
        Ok(())
    }
}
