// Toy partition table formats shared by the volume tests
//
// "sector" is a generic four-slot table keyed only on the 55AA boot
// signature. "vendor" adds a magic string near the start of the sector and
// keeps its own record list there, so any disk carrying both is claimed by
// whichever has the higher weight.

#![allow(dead_code)]

use strata_core::codec::{ByteReader, ByteWriter, Endian};
use strata_core::{share, SparseMemoryStream, SparseStream, StrataError};
use strata_disks::VirtualDisk;
use strata_volumes::{
    PartitionFormatValidator, PartitionRecord, PartitionTableFormat, PartitionTableRegistry,
    PartitionType, TableLayout,
};

pub const SECTOR: u64 = 512;
const SLOT_TABLE_OFFSET: usize = 446;
const SLOT_SIZE: usize = 16;
const SLOT_COUNT: usize = 4;
const VENDOR_MAGIC: &[u8; 8] = b"VENDORPT";
const VENDOR_TABLE_OFFSET: usize = 16;
const VENDOR_ENTRY_SIZE: usize = 17;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn has_boot_signature(bytes: &[u8]) -> bool {
    bytes.len() >= 512 && bytes[510] == 0x55 && bytes[511] == 0xAA
}

pub struct SectorTable {
    pub weight: i32,
}

impl PartitionFormatValidator for SectorTable {
    fn weight(&self) -> i32 {
        self.weight
    }

    fn validate(&self, first_sectors: &[u8]) -> bool {
        has_boot_signature(first_sectors)
    }
}

impl PartitionTableFormat for SectorTable {
    fn name(&self) -> &str {
        "sector"
    }

    fn parse(&self, disk: &mut dyn SparseStream, _sector_size: u32) -> Result<Vec<PartitionRecord>, StrataError> {
        let sector = disk.read_vec(0, 512)?;
        let mut reader = ByteReader::new(&sector);
        let mut records = Vec::new();
        for slot in 0..SLOT_COUNT {
            reader.seek(SLOT_TABLE_OFFSET + slot * SLOT_SIZE)?;
            let flags = reader.read_u8()?;
            let kind = reader.read_u8()?;
            reader.skip(2)?;
            let start = reader.read_u32(Endian::Little)?;
            let count = reader.read_u32(Endian::Little)?;
            if kind == 0 {
                continue;
            }
            records.push(PartitionRecord {
                partition_type: PartitionType::Byte(kind),
                start_sector: start as u64,
                sector_count: count as u64,
                active: flags & 0x80 != 0,
            });
        }
        Ok(records)
    }

    fn layout(&self, disk_sectors: u64) -> TableLayout {
        TableLayout {
            first_usable_sector: 1,
            usable_end_sector: disk_sectors.min(u32::MAX as u64),
            max_entries: SLOT_COUNT,
        }
    }

    fn commit(&self, disk: &mut dyn SparseStream, _sector_size: u32, records: &[PartitionRecord]) -> Result<(), StrataError> {
        let mut sector = disk.read_vec(0, 512)?;
        let mut writer = ByteWriter::new(&mut sector);
        writer.seek(SLOT_TABLE_OFFSET)?;
        for slot in 0..SLOT_COUNT {
            match records.get(slot) {
                Some(record) => {
                    let kind = match record.partition_type {
                        PartitionType::Byte(kind) => kind,
                        PartitionType::Guid(_) => {
                            return Err(StrataError::InvalidInput("sector tables use type bytes".to_string()))
                        }
                    };
                    writer.write_u8(if record.active { 0x80 } else { 0 })?;
                    writer.write_u8(kind)?;
                    writer.write_bytes(&[0, 0])?;
                    writer.write_u32(record.start_sector as u32, Endian::Little)?;
                    writer.write_u32(record.sector_count as u32, Endian::Little)?;
                    writer.write_bytes(&[0; 4])?;
                }
                None => writer.write_bytes(&[0; SLOT_SIZE])?,
            }
        }
        writer.write_bytes(&[0x55, 0xAA])?;
        disk.write_at(0, &sector)
    }
}

pub struct VendorTable;

impl PartitionFormatValidator for VendorTable {
    fn weight(&self) -> i32 {
        30
    }

    fn validate(&self, first_sectors: &[u8]) -> bool {
        has_boot_signature(first_sectors) && &first_sectors[3..11] == VENDOR_MAGIC
    }
}

impl PartitionTableFormat for VendorTable {
    fn name(&self) -> &str {
        "vendor"
    }

    fn parse(&self, disk: &mut dyn SparseStream, _sector_size: u32) -> Result<Vec<PartitionRecord>, StrataError> {
        let sector = disk.read_vec(0, 512)?;
        let mut reader = ByteReader::new(&sector);
        reader.seek(11)?;
        let count = reader.read_u8()? as usize;
        reader.seek(VENDOR_TABLE_OFFSET)?;
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            let start = reader.read_u64(Endian::Big)?;
            let length = reader.read_u64(Endian::Big)?;
            let kind = reader.read_u8()?;
            records.push(PartitionRecord::new(PartitionType::Byte(kind), start, length));
        }
        Ok(records)
    }

    fn layout(&self, disk_sectors: u64) -> TableLayout {
        TableLayout {
            first_usable_sector: 1,
            usable_end_sector: disk_sectors,
            max_entries: 8,
        }
    }
}

pub fn sector_table() -> Box<dyn PartitionTableFormat> {
    Box::new(SectorTable { weight: 10 })
}

/// Same layout as `sector_table`, registered under another name.
pub fn sector_table_twin() -> Box<dyn PartitionTableFormat> {
    Box::new(SectorTable { weight: 10 })
}

pub fn vendor_table() -> Box<dyn PartitionTableFormat> {
    Box::new(VendorTable)
}

pub fn registry() -> PartitionTableRegistry {
    let mut registry = PartitionTableRegistry::new();
    registry.register("sector", sector_table);
    registry.register("vendor", vendor_table);
    registry
}

/// Disk image with a sector table holding `(type, start, count)` slots.
pub fn sector_disk(size: u64, slots: &[(u8, u32, u32)]) -> SparseMemoryStream {
    let mut sector = vec![0u8; 512];
    for (slot, &(kind, start, count)) in slots.iter().enumerate() {
        let at = SLOT_TABLE_OFFSET + slot * SLOT_SIZE;
        sector[at + 1] = kind;
        sector[at + 4..at + 8].copy_from_slice(&start.to_le_bytes());
        sector[at + 8..at + 12].copy_from_slice(&count.to_le_bytes());
    }
    sector[510] = 0x55;
    sector[511] = 0xAA;
    let mut disk = SparseMemoryStream::new(size);
    disk.write_at(0, &sector).unwrap();
    disk
}

/// Adds a vendor table of `(type, start, count)` entries to a disk.
pub fn add_vendor_table(disk: &mut SparseMemoryStream, entries: &[(u8, u64, u64)]) {
    let mut sector = disk.read_vec(0, 512).unwrap();
    sector[3..11].copy_from_slice(VENDOR_MAGIC);
    sector[11] = entries.len() as u8;
    let mut writer = ByteWriter::new(&mut sector);
    writer.seek(VENDOR_TABLE_OFFSET).unwrap();
    for &(kind, start, count) in entries {
        writer.write_u64(start, Endian::Big).unwrap();
        writer.write_u64(count, Endian::Big).unwrap();
        writer.write_u8(kind).unwrap();
    }
    disk.write_at(0, &sector).unwrap();
}

pub fn virtual_disk(identity: &str, content: SparseMemoryStream) -> VirtualDisk {
    VirtualDisk::new(share(content), identity)
}
