// Filesystem plugin registry
//
// Plugins inspect a volume stream and offer zero or more named descriptors.
// The registry asks every plugin, highest priority first, and returns the
// union; opening a descriptor hands back a type-erased mounted filesystem.

use crate::ops::FilesystemOps;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use strata_core::{EngineConfig, SharedStream, SparseStream, StrataError};

/// Options applied when mounting a filesystem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenParameters {
    pub read_only: bool,
    /// `None` keeps the driver's own convention.
    pub case_sensitive: Option<bool>,
    pub options: HashMap<String, String>,
}

impl OpenParameters {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            case_sensitive: config.case_sensitive_paths.then_some(true),
            ..Self::default()
        }
    }

    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

pub type FileSystemOpener =
    Rc<dyn Fn(SharedStream, &OpenParameters) -> Result<Box<dyn FilesystemOps>, StrataError>>;

/// One way a plugin can mount a given volume.
#[derive(Clone)]
pub struct FileSystemDescriptor {
    pub name: String,
    pub description: String,
    pub plugin: String,
    opener: FileSystemOpener,
}

impl FileSystemDescriptor {
    pub fn new<F>(name: &str, description: &str, plugin: &str, opener: F) -> Self
    where
        F: Fn(SharedStream, &OpenParameters) -> Result<Box<dyn FilesystemOps>, StrataError> + 'static,
    {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            plugin: plugin.to_string(),
            opener: Rc::new(opener),
        }
    }

    pub fn open(
        &self,
        volume: SharedStream,
        params: &OpenParameters,
    ) -> Result<Box<dyn FilesystemOps>, StrataError> {
        info!("Opening {} filesystem via plugin {}", self.name, self.plugin);
        (self.opener)(volume, params)
    }
}

impl fmt::Debug for FileSystemDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystemDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("plugin", &self.plugin)
            .finish()
    }
}

/// Filesystem plugin - recognizes volumes it can mount
pub trait FileSystemPlugin {
    fn name(&self) -> &str;

    /// Higher is asked first
    fn priority(&self) -> i32 {
        0
    }

    /// Descriptors for every variant this plugin recognizes on `volume`.
    /// An unrecognized volume is an empty list, not an error.
    fn detect(&self, volume: &mut dyn SparseStream) -> Result<Vec<FileSystemDescriptor>, StrataError>;
}

#[derive(Default)]
pub struct FileSystemRegistry {
    plugins: Vec<Arc<dyn FileSystemPlugin>>,
}

impl FileSystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn FileSystemPlugin>) {
        info!("Registering filesystem plugin: {} (priority {})", plugin.name(), plugin.priority());
        self.plugins.push(plugin);
        // Stable: equal priorities keep registration order.
        self.plugins.sort_by_key(|p| Reverse(p.priority()));
    }

    pub fn list_plugins(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Union of every plugin's descriptors, highest priority first.
    pub fn detect(&self, volume: &SharedStream) -> Result<Vec<FileSystemDescriptor>, StrataError> {
        let mut found = Vec::new();
        for plugin in &self.plugins {
            let descriptors = {
                let mut stream = volume.borrow_mut();
                plugin.detect(&mut *stream)?
            };
            debug!("Plugin {} offered {} descriptor(s)", plugin.name(), descriptors.len());
            found.extend(descriptors);
        }
        Ok(found)
    }

    /// Mount with the first descriptor detected.
    pub fn open_first(
        &self,
        volume: SharedStream,
        params: &OpenParameters,
    ) -> Result<Box<dyn FilesystemOps>, StrataError> {
        let descriptors = self.detect(&volume)?;
        match descriptors.first() {
            Some(descriptor) => descriptor.open(volume, params),
            None => Err(StrataError::NotSupported("Could not detect filesystem type".to_string())),
        }
    }
}
