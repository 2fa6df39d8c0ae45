// Partition table detection and editing
//
// Formats are supplied by the host through an explicit name -> constructor
// registry. Every enabled validator sees the leading sectors of the disk; the
// highest weight match wins and ties go to the format registered first. No
// match means the disk is unpartitioned, which is not an error.

use crate::partition::{PartitionRecord, PartitionType};
use log::{debug, info};
use strata_core::{SparseStream, StrataError};

pub trait PartitionFormatValidator {
    /// Higher weights override lower ones when both match.
    fn weight(&self) -> i32;

    fn enabled(&self) -> bool {
        true
    }

    fn validate(&self, first_sectors: &[u8]) -> bool;
}

/// Region of the disk a format may place partitions in, and how many it can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    pub first_usable_sector: u64,
    /// First sector past the usable region.
    pub usable_end_sector: u64,
    pub max_entries: usize,
}

pub trait PartitionTableFormat: PartitionFormatValidator {
    fn name(&self) -> &str;

    /// Read the partition records, in on-disk order.
    fn parse(&self, disk: &mut dyn SparseStream, sector_size: u32) -> Result<Vec<PartitionRecord>, StrataError>;

    fn layout(&self, disk_sectors: u64) -> TableLayout;

    /// Write `records` back to the disk.
    fn commit(
        &self,
        _disk: &mut dyn SparseStream,
        _sector_size: u32,
        _records: &[PartitionRecord],
    ) -> Result<(), StrataError> {
        Err(StrataError::NotSupported(format!(
            "{} partition tables are read-only",
            self.name()
        )))
    }
}

pub type FormatConstructor = fn() -> Box<dyn PartitionTableFormat>;

#[derive(Clone, Default)]
pub struct PartitionTableRegistry {
    formats: Vec<(String, FormatConstructor)>,
}

impl PartitionTableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a format. Re-registering a name replaces its constructor but keeps
    /// its original position.
    pub fn register(&mut self, name: &str, constructor: FormatConstructor) {
        info!("Registering partition table format: {}", name);
        match self.formats.iter_mut().find(|(existing, _)| existing == name) {
            Some(entry) => entry.1 = constructor,
            None => self.formats.push((name.to_string(), constructor)),
        }
    }

    pub fn list_formats(&self) -> Vec<String> {
        self.formats.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Pick the format for `first_sectors`, or `None` if nothing matches.
    pub fn detect_format(&self, first_sectors: &[u8]) -> Option<Box<dyn PartitionTableFormat>> {
        let mut best: Option<Box<dyn PartitionTableFormat>> = None;
        for (name, constructor) in &self.formats {
            let candidate = constructor();
            if !candidate.enabled() {
                debug!("Partition format {} disabled, skipping", name);
                continue;
            }
            if !candidate.validate(first_sectors) {
                continue;
            }
            debug!("Partition format {} matched with weight {}", name, candidate.weight());
            let better = match &best {
                Some(current) => candidate.weight() > current.weight(),
                None => true,
            };
            if better {
                best = Some(candidate);
            }
        }
        best
    }

    /// Detect and parse the partition table of `disk`.
    ///
    /// `detection_bytes` bounds how much of the disk validators see.
    pub fn open(
        &self,
        disk: &mut dyn SparseStream,
        sector_size: u32,
        detection_bytes: u64,
    ) -> Result<Option<PartitionTable>, StrataError> {
        let window = detection_bytes.min(disk.len());
        let first_sectors = disk.read_vec(0, window as usize)?;
        let Some(format) = self.detect_format(&first_sectors) else {
            debug!("No partition table recognised");
            return Ok(None);
        };
        let records = format.parse(disk, sector_size)?;
        info!("Detected {} partition table with {} entries", format.name(), records.len());
        Ok(Some(PartitionTable::new(format, records, sector_size, disk.len() / sector_size as u64)))
    }
}

/// A detected table: its format plus the parsed records.
pub struct PartitionTable {
    format: Box<dyn PartitionTableFormat>,
    records: Vec<PartitionRecord>,
    sector_size: u32,
    disk_sectors: u64,
}

impl PartitionTable {
    pub fn new(
        format: Box<dyn PartitionTableFormat>,
        records: Vec<PartitionRecord>,
        sector_size: u32,
        disk_sectors: u64,
    ) -> Self {
        Self {
            format,
            records,
            sector_size,
            disk_sectors,
        }
    }

    pub fn format_name(&self) -> &str {
        self.format.name()
    }

    pub fn partitions(&self) -> &[PartitionRecord] {
        &self.records
    }

    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    pub fn layout(&self) -> TableLayout {
        self.format.layout(self.disk_sectors)
    }

    /// Unused `(start_sector, sector_count)` runs inside the usable region, ascending.
    pub fn free_extents(&self) -> Vec<(u64, u64)> {
        let layout = self.layout();
        let mut used: Vec<(u64, u64)> = self
            .records
            .iter()
            .map(|r| (r.start_sector, r.end_sector()))
            .collect();
        used.sort_unstable();

        let mut free = Vec::new();
        let mut cursor = layout.first_usable_sector;
        for (start, end) in used {
            let start = start.min(layout.usable_end_sector);
            if start > cursor {
                free.push((cursor, start - cursor));
            }
            cursor = cursor.max(end);
        }
        if layout.usable_end_sector > cursor {
            free.push((cursor, layout.usable_end_sector - cursor));
        }
        free
    }

    /// Append a partition of at least `size_bytes` in the first free run
    /// large enough to hold it.
    pub fn create(
        &mut self,
        size_bytes: u64,
        partition_type: PartitionType,
        active: bool,
    ) -> Result<PartitionRecord, StrataError> {
        let layout = self.layout();
        if self.records.len() >= layout.max_entries {
            return Err(StrataError::TableFull {
                max_entries: layout.max_entries,
            });
        }
        let sectors = size_bytes.div_ceil(self.sector_size as u64).max(1);
        let free = self.free_extents();
        let (start, _) = free
            .iter()
            .copied()
            .find(|&(_, count)| count >= sectors)
            .ok_or(StrataError::InsufficientSpace {
                requested: sectors,
                largest_free: free.iter().map(|&(_, count)| count).max().unwrap_or(0),
            })?;

        if active {
            for record in &mut self.records {
                record.active = false;
            }
        }
        let record = PartitionRecord {
            partition_type,
            start_sector: start,
            sector_count: sectors,
            active,
        };
        info!(
            "Created {} partition {} at sector {} ({} sectors)",
            self.format.name(),
            record.partition_type,
            start,
            sectors
        );
        self.records.push(record.clone());
        Ok(record)
    }

    /// Persist the records through the format.
    pub fn commit(&self, disk: &mut dyn SparseStream) -> Result<(), StrataError> {
        self.format.commit(disk, self.sector_size, &self.records)
    }
}

impl std::fmt::Debug for PartitionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionTable")
            .field("format", &self.format.name())
            .field("records", &self.records)
            .field("sector_size", &self.sector_size)
            .field("disk_sectors", &self.disk_sectors)
            .finish()
    }
}
