// Toy "jsonfs" filesystem shared by the dispatch tests
//
// Volume layout: the magic "JSONFS\0\0", a little-endian u32 byte count, then
// a JSON directory tree. File nodes name a byte range of the volume that
// holds their content. Every node carries an id used as its cache id.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strata_core::{share, SharedStream, SparseMemoryStream, SparseStream, StrataError, SubStream};
use strata_filesystems::{
    FileAttributes, FileSystemDescriptor, FileSystemPlugin, FilesystemInfo, FilesystemOps, OpenParameters,
    VfsDirEntry, VfsDirectory, VfsDriver, VfsFile, VfsFileSystem,
};

pub const MAGIC: &[u8; 8] = b"JSONFS\0\0";
pub const VOLUME_SIZE: u64 = 64 * 1024;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonNode {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub children: Option<Vec<JsonNode>>,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub length: u64,
}

impl JsonNode {
    pub fn dir(id: u64, name: &str, children: Vec<JsonNode>) -> Self {
        Self {
            id,
            name: name.to_string(),
            children: Some(children),
            offset: 0,
            length: 0,
        }
    }

    pub fn file(id: u64, name: &str, offset: u64, length: u64) -> Self {
        Self {
            id,
            name: name.to_string(),
            children: None,
            offset,
            length,
        }
    }
}

impl VfsDirEntry for JsonNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_directory(&self) -> bool {
        self.children.is_some()
    }

    fn unique_cache_id(&self) -> u64 {
        self.id
    }

    fn attributes(&self) -> FileAttributes {
        if self.is_directory() {
            FileAttributes::directory()
        } else {
            FileAttributes::file(self.length)
        }
    }
}

/// Driver state: the volume, its tree and how often wrappers were built.
pub struct JsonContext {
    pub volume: SharedStream,
    pub root: JsonNode,
    pub directory_opens: usize,
    pub file_opens: usize,
}

pub struct JsonDirectory {
    children: Vec<JsonNode>,
}

impl VfsDirectory for JsonDirectory {
    type Context = JsonContext;
    type Entry = JsonNode;

    fn entries(&mut self, _context: &mut JsonContext) -> Result<Vec<JsonNode>, StrataError> {
        Ok(self.children.clone())
    }
}

pub struct JsonFile {
    offset: u64,
    length: u64,
}

impl VfsFile for JsonFile {
    type Context = JsonContext;

    fn length(&self) -> u64 {
        self.length
    }

    fn open_stream(&mut self, context: &mut JsonContext) -> Result<Box<dyn SparseStream>, StrataError> {
        Ok(Box::new(SubStream::new(context.volume.clone(), self.offset, self.length)?))
    }
}

pub struct JsonDriver {
    pub case_sensitive: bool,
    pub writable: bool,
}

impl VfsDriver for JsonDriver {
    type Context = JsonContext;
    type Entry = JsonNode;
    type File = JsonFile;
    type Directory = JsonDirectory;

    fn filesystem_type(&self) -> &str {
        "jsonfs"
    }

    fn root(&self, context: &mut JsonContext) -> Result<JsonNode, StrataError> {
        Ok(context.root.clone())
    }

    fn open_directory(&self, context: &mut JsonContext, entry: &JsonNode) -> Result<JsonDirectory, StrataError> {
        context.directory_opens += 1;
        let children = entry
            .children
            .clone()
            .ok_or_else(|| StrataError::NotADirectory(entry.name.clone()))?;
        Ok(JsonDirectory { children })
    }

    fn open_file(&self, context: &mut JsonContext, entry: &JsonNode) -> Result<JsonFile, StrataError> {
        context.file_opens += 1;
        Ok(JsonFile {
            offset: entry.offset,
            length: entry.length,
        })
    }

    fn statfs(&self, context: &mut JsonContext) -> Result<FilesystemInfo, StrataError> {
        let total = context.volume.len();
        Ok(FilesystemInfo {
            total_space: total,
            block_size: 512,
            max_filename_length: 255,
            filesystem_type: "jsonfs".to_string(),
            volume_label: Some(context.root.name.clone()),
            ..FilesystemInfo::default()
        })
    }

    fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn is_readonly(&self) -> bool {
        !self.writable
    }
}

fn read_tree(volume: &mut dyn SparseStream) -> Result<JsonNode, StrataError> {
    let header = volume.read_vec(0, 12)?;
    let length = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;
    let json = volume.read_vec(12, length)?;
    Ok(serde_json::from_slice(&json)?)
}

/// Mount the toy filesystem directly, bypassing detection.
pub fn mount(volume: SharedStream, driver: JsonDriver, params: &OpenParameters) -> Result<VfsFileSystem<JsonDriver>, StrataError> {
    let root = read_tree(&mut *volume.borrow_mut())?;
    let context = JsonContext {
        volume,
        root,
        directory_opens: 0,
        file_opens: 0,
    };
    VfsFileSystem::mount(driver, context, params)
}

/// Offers "jsonfs" for every volume with the magic, plus a "jsonfs-ro"
/// variant that always mounts read-only.
pub struct JsonPlugin {
    pub priority: i32,
}

impl FileSystemPlugin for JsonPlugin {
    fn name(&self) -> &str {
        "json"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn detect(&self, volume: &mut dyn SparseStream) -> Result<Vec<FileSystemDescriptor>, StrataError> {
        if volume.len() < 12 || volume.read_vec(0, 8)? != MAGIC {
            return Ok(Vec::new());
        }
        let writable = volume.can_write();
        let open = move |volume: SharedStream, params: &OpenParameters| -> Result<Box<dyn FilesystemOps>, StrataError> {
            let driver = JsonDriver {
                case_sensitive: false,
                writable,
            };
            Ok(Box::new(mount(volume, driver, params)?))
        };
        Ok(vec![
            FileSystemDescriptor::new("jsonfs", "JSON tree filesystem", "json", open),
            FileSystemDescriptor::new("jsonfs-ro", "JSON tree filesystem, read-only", "json", move |volume, params| {
                let params = OpenParameters {
                    read_only: true,
                    ..params.clone()
                };
                open(volume, &params)
            }),
        ])
    }
}

/// Accepts any volume; used to check ordering against the json plugin.
pub struct CatchAllPlugin {
    pub priority: i32,
}

impl FileSystemPlugin for CatchAllPlugin {
    fn name(&self) -> &str {
        "catch-all"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn detect(&self, _volume: &mut dyn SparseStream) -> Result<Vec<FileSystemDescriptor>, StrataError> {
        Ok(vec![FileSystemDescriptor::new("blob", "unstructured volume", "catch-all", |_, _| {
            Err(StrataError::NotSupported("blob volumes cannot be mounted".to_string()))
        })])
    }
}

pub fn json_plugin(priority: i32) -> Arc<dyn FileSystemPlugin> {
    Arc::new(JsonPlugin { priority })
}

/// Tree used by most tests:
///
/// /README.txt            "hello jsonfs"
/// /docs/Guide.md         "# guide"
/// /docs/nested/data.bin  4 KiB of 0xAB
pub fn sample_tree() -> JsonNode {
    JsonNode::dir(
        1,
        "sample",
        vec![
            JsonNode::file(2, "README.txt", 8192, 12),
            JsonNode::dir(
                3,
                "docs",
                vec![
                    JsonNode::file(4, "Guide.md", 8704, 7),
                    JsonNode::dir(5, "nested", vec![JsonNode::file(6, "data.bin", 12288, 4096)]),
                ],
            ),
        ],
    )
}

/// Volume bytes for `tree` with `files` written at their offsets.
pub fn json_volume(tree: &JsonNode, files: &[(u64, &[u8])]) -> SparseMemoryStream {
    let json = serde_json::to_vec(tree).unwrap();
    let mut volume = SparseMemoryStream::new(VOLUME_SIZE);
    volume.write_at(0, MAGIC).unwrap();
    volume.write_at(8, &(json.len() as u32).to_le_bytes()).unwrap();
    volume.write_at(12, &json).unwrap();
    for &(offset, data) in files {
        volume.write_at(offset, data).unwrap();
    }
    volume
}

pub fn sample_volume() -> SparseMemoryStream {
    json_volume(
        &sample_tree(),
        &[(8192, b"hello jsonfs"), (8704, b"# guide"), (12288, &[0xAB; 4096])],
    )
}

pub fn sample_shared() -> SharedStream {
    share(sample_volume())
}
