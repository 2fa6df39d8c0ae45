// Partition records

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Format-defined partition type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionType {
    /// Single type byte, as in PC-style tables.
    Byte(u8),
    /// Type GUID, as in GUID-based tables.
    Guid(Uuid),
}

impl fmt::Display for PartitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionType::Byte(value) => write!(f, "0x{:02X}", value),
            PartitionType::Guid(guid) => write!(f, "{}", guid),
        }
    }
}

/// One entry of a partition table. Its index in the table is its ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRecord {
    pub partition_type: PartitionType,
    pub start_sector: u64,
    pub sector_count: u64,
    pub active: bool,
}

impl PartitionRecord {
    pub fn new(partition_type: PartitionType, start_sector: u64, sector_count: u64) -> Self {
        Self {
            partition_type,
            start_sector,
            sector_count,
            active: false,
        }
    }

    /// First sector past the partition.
    pub fn end_sector(&self) -> u64 {
        self.start_sector + self.sector_count
    }

    pub fn byte_offset(&self, sector_size: u32) -> u64 {
        self.start_sector * sector_size as u64
    }

    pub fn byte_length(&self, sector_size: u32) -> u64 {
        self.sector_count * sector_size as u64
    }

    pub fn overlaps(&self, start_sector: u64, sector_count: u64) -> bool {
        self.start_sector < start_sector + sector_count && start_sector < self.end_sector()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_bounds() {
        let record = PartitionRecord::new(PartitionType::Byte(0x83), 2048, 1024);
        assert_eq!(record.end_sector(), 3072);
        assert_eq!(record.byte_offset(512), 2048 * 512);
        assert_eq!(record.byte_length(4096), 1024 * 4096);
        assert!(record.overlaps(3000, 100));
        assert!(!record.overlaps(3072, 100));
        assert!(!record.overlaps(0, 2048));
        assert_eq!(record.partition_type.to_string(), "0x83");
    }
}
