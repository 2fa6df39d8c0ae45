// Volume manager
// Physical volumes are whole disks; logical volumes are partitions. Identities
// are derived from the disk identity and the partition ordinal only, so they
// survive re-enumeration of an unchanged disk.

use crate::partition::PartitionType;
use crate::table::{PartitionTable, PartitionTableRegistry};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use strata_core::{share, EngineConfig, Geometry, SharedStream, StrataError, SubStream};
use strata_disks::VirtualDisk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeKind {
    Physical,
    Logical { partition_ordinal: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub identity: String,
    pub kind: VolumeKind,
    pub disk_identity: String,
    /// Byte offset of the volume on its disk.
    pub offset: u64,
    pub length: u64,
    pub geometry: Geometry,
    pub partition_type: Option<PartitionType>,
    pub active: bool,
}

impl VolumeInfo {
    pub fn physical_identity(disk_identity: &str) -> String {
        format!("phys:{}", disk_identity)
    }

    pub fn logical_identity(disk_identity: &str, ordinal: usize) -> String {
        format!("part:{}:{}", disk_identity, ordinal)
    }

    pub fn is_physical(&self) -> bool {
        self.kind == VolumeKind::Physical
    }
}

struct AttachedDisk {
    disk: VirtualDisk,
    physical: VolumeInfo,
    logical: Vec<VolumeInfo>,
    table: Option<PartitionTable>,
}

pub struct VolumeManager {
    registry: PartitionTableRegistry,
    config: EngineConfig,
    disks: Vec<AttachedDisk>,
}

impl VolumeManager {
    pub fn new(registry: PartitionTableRegistry) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    pub fn with_config(registry: PartitionTableRegistry, config: EngineConfig) -> Self {
        Self {
            registry,
            config,
            disks: Vec::new(),
        }
    }

    /// Attach a disk: one physical volume plus a logical volume per
    /// partition record. Returns the physical volume identity.
    pub fn add_disk(&mut self, disk: VirtualDisk) -> Result<String, StrataError> {
        let disk_identity = disk.identity().to_string();
        if self.disks.iter().any(|d| d.disk.identity() == disk_identity) {
            return Err(StrataError::InvalidInput(format!(
                "disk {} is already attached",
                disk_identity
            )));
        }

        let sector_size = disk.sector_size();
        let capacity = disk.capacity();
        let detection_bytes = self.config.detection_sectors as u64 * sector_size as u64;
        let table = {
            let content = disk.content();
            let mut stream = content.borrow_mut();
            self.registry.open(&mut *stream, sector_size, detection_bytes)?
        };

        let physical = VolumeInfo {
            identity: VolumeInfo::physical_identity(&disk_identity),
            kind: VolumeKind::Physical,
            disk_identity: disk_identity.clone(),
            offset: 0,
            length: capacity,
            geometry: disk.geometry(),
            partition_type: None,
            active: false,
        };

        let mut logical = Vec::new();
        if let Some(table) = &table {
            for (ordinal, record) in table.partitions().iter().enumerate() {
                let offset = record.byte_offset(sector_size);
                let length = record.byte_length(sector_size);
                StrataError::check_range(offset, length, capacity)?;
                debug!(
                    "Partition {} of {}: {} bytes at offset {}",
                    ordinal, disk_identity, length, offset
                );
                logical.push(VolumeInfo {
                    identity: VolumeInfo::logical_identity(&disk_identity, ordinal),
                    kind: VolumeKind::Logical {
                        partition_ordinal: ordinal,
                    },
                    disk_identity: disk_identity.clone(),
                    offset,
                    length,
                    geometry: Geometry::from_capacity(length, sector_size),
                    partition_type: Some(record.partition_type.clone()),
                    active: record.active,
                });
            }
        }

        info!(
            "Attached disk {} ({} bytes, {} logical volumes)",
            disk_identity,
            capacity,
            logical.len()
        );
        let identity = physical.identity.clone();
        self.disks.push(AttachedDisk {
            disk,
            physical,
            logical,
            table,
        });
        Ok(identity)
    }

    fn volumes(&self) -> impl Iterator<Item = (&AttachedDisk, &VolumeInfo)> {
        self.disks.iter().flat_map(|attached| {
            std::iter::once(&attached.physical)
                .chain(attached.logical.iter())
                .map(move |volume| (attached, volume))
        })
    }

    pub fn get_volume(&self, identity: &str) -> Result<VolumeInfo, StrataError> {
        self.volumes()
            .find(|(_, volume)| volume.identity == identity)
            .map(|(_, volume)| volume.clone())
            .ok_or_else(|| StrataError::NotFound(format!("volume {}", identity)))
    }

    /// Stream over the volume's bytes: the disk itself for a physical
    /// volume, a byte-range view for a logical one.
    pub fn open_volume(&self, identity: &str) -> Result<SharedStream, StrataError> {
        let (attached, volume) = self
            .volumes()
            .find(|(_, volume)| volume.identity == identity)
            .ok_or_else(|| StrataError::NotFound(format!("volume {}", identity)))?;
        let content = attached.disk.content();
        match volume.kind {
            VolumeKind::Physical => Ok(content),
            VolumeKind::Logical { .. } => Ok(share(SubStream::new(content, volume.offset, volume.length)?)),
        }
    }

    /// Whole-disk volumes in attach order.
    pub fn get_physical_volumes(&self) -> Vec<VolumeInfo> {
        self.disks.iter().map(|d| d.physical.clone()).collect()
    }

    /// Partition volumes, by attach order then ordinal.
    pub fn get_logical_volumes(&self) -> Vec<VolumeInfo> {
        self.disks
            .iter()
            .flat_map(|d| d.logical.iter().cloned())
            .collect()
    }

    pub fn disks(&self) -> Vec<&VirtualDisk> {
        self.disks.iter().map(|d| &d.disk).collect()
    }

    /// Detected partition table of an attached disk, if it has one.
    pub fn partition_table(&self, disk_identity: &str) -> Option<&PartitionTable> {
        self.disks
            .iter()
            .find(|d| d.disk.identity() == disk_identity)
            .and_then(|d| d.table.as_ref())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
