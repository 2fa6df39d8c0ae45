// Disk container contract
// A container plugin recognises an image file format and exposes its logical
// disk content as a stream. Plugins are registered explicitly by the host.

use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use strata_core::{Geometry, SharedStream, SparseStream, StrataError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccess {
    Read,
    ReadWrite,
}

/// An attached disk: its content stream plus the metadata volumes need.
#[derive(Clone)]
pub struct VirtualDisk {
    content: SharedStream,
    geometry: Geometry,
    sector_size: u32,
    identity: String,
    parent_identity: Option<String>,
}

impl VirtualDisk {
    pub fn new(content: SharedStream, identity: impl Into<String>) -> Self {
        let capacity = content.borrow().len();
        let sector_size = strata_core::config::DEFAULT_SECTOR_SIZE;
        Self {
            content,
            geometry: Geometry::from_capacity(capacity, sector_size),
            sector_size,
            identity: identity.into(),
            parent_identity: None,
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_sector_size(mut self, sector_size: u32) -> Self {
        self.sector_size = sector_size;
        self.geometry = Geometry::from_capacity(self.capacity(), sector_size);
        self
    }

    pub fn with_parent_identity(mut self, parent: impl Into<String>) -> Self {
        self.parent_identity = Some(parent.into());
        self
    }

    /// Shared handle to the disk content.
    pub fn content(&self) -> SharedStream {
        self.content.clone()
    }

    pub fn capacity(&self) -> u64 {
        self.content.borrow().len()
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    /// Stable identity: disk signature or container-assigned id.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn parent_identity(&self) -> Option<&str> {
        self.parent_identity.as_deref()
    }

    pub fn is_writable(&self) -> bool {
        self.content.borrow().can_write()
    }
}

impl std::fmt::Debug for VirtualDisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualDisk")
            .field("identity", &self.identity)
            .field("capacity", &self.capacity())
            .field("geometry", &self.geometry)
            .field("sector_size", &self.sector_size)
            .field("parent_identity", &self.parent_identity)
            .finish()
    }
}

pub trait DiskContainerPlugin {
    /// Short format name, e.g. "raw".
    fn name(&self) -> &str;

    /// Cheap check of whether `stream` holds this container format.
    fn probe(&self, stream: &mut dyn SparseStream) -> Result<bool, StrataError>;

    fn open(&self, stream: SharedStream, access: FileAccess) -> Result<VirtualDisk, StrataError>;
}

pub struct ContainerRegistry {
    plugins: HashMap<String, Arc<dyn DiskContainerPlugin>>,
    order: Vec<String>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Registry with the built-in raw container.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::raw::RawContainer));
        registry
    }

    /// Register a plugin; a later registration under the same name replaces it.
    pub fn register(&mut self, plugin: Arc<dyn DiskContainerPlugin>) {
        let name = plugin.name().to_string();
        info!("Registering disk container: {}", name);
        if self.plugins.insert(name.clone(), plugin).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DiskContainerPlugin>> {
        self.plugins.get(name).cloned()
    }

    /// Names in registration order.
    pub fn list_containers(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Every container format that claims `stream`, in registration order.
    pub fn probe(&self, stream: &mut dyn SparseStream) -> Result<Vec<String>, StrataError> {
        let mut matches = Vec::new();
        for name in &self.order {
            if let Some(plugin) = self.plugins.get(name) {
                if plugin.probe(stream)? {
                    debug!("Container {} matched", name);
                    matches.push(name.clone());
                }
            }
        }
        Ok(matches)
    }

    pub fn open(&self, name: &str, stream: SharedStream, access: FileAccess) -> Result<VirtualDisk, StrataError> {
        let plugin = self
            .get(name)
            .ok_or_else(|| StrataError::NotFound(format!("disk container '{}'", name)))?;
        plugin.open(stream, access)
    }
}

impl Default for ContainerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{share, SparseMemoryStream};

    struct MagicContainer;

    impl DiskContainerPlugin for MagicContainer {
        fn name(&self) -> &str {
            "magic"
        }

        fn probe(&self, stream: &mut dyn SparseStream) -> Result<bool, StrataError> {
            if stream.len() < 4 {
                return Ok(false);
            }
            Ok(stream.read_vec(0, 4)? == b"MAGC")
        }

        fn open(&self, stream: SharedStream, _access: FileAccess) -> Result<VirtualDisk, StrataError> {
            Ok(VirtualDisk::new(stream, "magic-disk"))
        }
    }

    #[test]
    fn test_probe_returns_all_matches_in_order() {
        let mut registry = ContainerRegistry::with_defaults();
        registry.register(Arc::new(MagicContainer));
        assert_eq!(registry.list_containers(), vec!["raw", "magic"]);

        let mut image = SparseMemoryStream::new(1024);
        image.write_at(0, b"MAGC").unwrap();
        assert_eq!(registry.probe(&mut image).unwrap(), vec!["raw", "magic"]);

        let mut plain = SparseMemoryStream::new(1024);
        assert_eq!(registry.probe(&mut plain).unwrap(), vec!["raw"]);
    }

    #[test]
    fn test_open_unknown_container() {
        let registry = ContainerRegistry::new();
        let result = registry.open("vhd", share(SparseMemoryStream::new(512)), FileAccess::Read);
        assert!(matches!(result, Err(StrataError::NotFound(_))));
    }

    #[test]
    fn test_virtual_disk_metadata() {
        let disk = VirtualDisk::new(share(SparseMemoryStream::new(64 * 1024 * 1024)), "disk-a")
            .with_parent_identity("disk-base");
        assert_eq!(disk.capacity(), 64 * 1024 * 1024);
        assert_eq!(disk.geometry().heads_per_cylinder, 16);
        assert_eq!(disk.parent_identity(), Some("disk-base"));
        assert!(disk.is_writable());
    }
}
