// Disk geometry (cylinders / heads / sectors)
// Advisory only: all addressing in the engine is by byte offset or LBA.

use serde::{Deserialize, Serialize};

/// Cylinder/head/sector address. Sectors are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChsAddress {
    pub cylinder: u16,
    pub head: u8,
    pub sector: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub cylinders: u32,
    pub heads_per_cylinder: u32,
    pub sectors_per_track: u32,
    pub bytes_per_sector: u32,
}

impl Geometry {
    pub fn new(cylinders: u32, heads_per_cylinder: u32, sectors_per_track: u32, bytes_per_sector: u32) -> Self {
        Self {
            cylinders,
            heads_per_cylinder,
            sectors_per_track,
            bytes_per_sector,
        }
    }

    /// LBA-assisted BIOS translation: 63 sectors per track, head count chosen
    /// by capacity, cylinders capped at 1024.
    pub fn from_capacity(capacity: u64, bytes_per_sector: u32) -> Self {
        let sectors_per_track = 63u32;
        let total_sectors = capacity / bytes_per_sector.max(1) as u64;
        let mib = capacity / (1024 * 1024);

        let heads_per_cylinder = match mib {
            0..=504 => 16,
            505..=1008 => 32,
            1009..=2016 => 64,
            2017..=4032 => 128,
            _ => 255,
        };

        let cylinder_size = (heads_per_cylinder * sectors_per_track) as u64;
        let cylinders = (total_sectors / cylinder_size).clamp(1, 1024) as u32;

        Self {
            cylinders,
            heads_per_cylinder,
            sectors_per_track,
            bytes_per_sector,
        }
    }

    pub fn total_sectors(&self) -> u64 {
        self.cylinders as u64 * self.heads_per_cylinder as u64 * self.sectors_per_track as u64
    }

    pub fn capacity(&self) -> u64 {
        self.total_sectors() * self.bytes_per_sector as u64
    }

    /// Translate an LBA into a CHS address.
    ///
    /// Addresses beyond cylinder 1023 saturate to 1023/254/63, the value
    /// partition tables use to signal "use the LBA fields instead".
    pub fn to_chs(&self, lba: u64) -> ChsAddress {
        let sectors_per_track = self.sectors_per_track.max(1) as u64;
        let cylinder_size = self.heads_per_cylinder.max(1) as u64 * sectors_per_track;

        let cylinder = lba / cylinder_size;
        if cylinder > 1023 {
            return ChsAddress {
                cylinder: 1023,
                head: 254,
                sector: 63,
            };
        }

        let temp = lba % cylinder_size;
        ChsAddress {
            cylinder: cylinder as u16,
            head: (temp / sectors_per_track) as u8,
            sector: ((temp % sectors_per_track) + 1) as u8,
        }
    }

    pub fn to_lba(&self, chs: ChsAddress) -> u64 {
        (chs.cylinder as u64 * self.heads_per_cylinder as u64 + chs.head as u64)
            * self.sectors_per_track as u64
            + chs.sector.saturating_sub(1) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_disk_geometry() {
        let geometry = Geometry::from_capacity(64 * 1024 * 1024, 512);
        assert_eq!(geometry.heads_per_cylinder, 16);
        assert_eq!(geometry.sectors_per_track, 63);
        assert_eq!(geometry.cylinders, 130);
        assert!(geometry.capacity() <= 64 * 1024 * 1024);
    }

    #[test]
    fn test_large_disk_caps_cylinders() {
        let geometry = Geometry::from_capacity(500 * 1024 * 1024 * 1024, 512);
        assert_eq!(geometry.heads_per_cylinder, 255);
        assert_eq!(geometry.cylinders, 1024);
    }

    #[test]
    fn test_chs_translation() {
        let geometry = Geometry::new(1024, 255, 63, 512);

        // LBA 2048 is the conventional 1 MiB aligned partition start.
        let chs = geometry.to_chs(2048);
        assert_eq!(chs, ChsAddress { cylinder: 0, head: 32, sector: 33 });
        assert_eq!(geometry.to_lba(chs), 2048);

        let beyond = geometry.to_chs(255 * 63 * 2000);
        assert_eq!(beyond, ChsAddress { cylinder: 1023, head: 254, sector: 63 });
    }
}
