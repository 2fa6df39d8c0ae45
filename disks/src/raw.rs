// Raw (flat) disk images: the file content is the disk content

use crate::container::{DiskContainerPlugin, FileAccess, VirtualDisk};
use log::debug;
use strata_core::codec::{ByteReader, Endian};
use strata_core::{share, ReadOnlyStream, SharedStream, SparseStream, StrataError};

const MBR_SIGNATURE_OFFSET: usize = 440;
const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];

pub struct RawContainer;

impl RawContainer {
    /// Disk identity: the MBR disk signature when one is set, otherwise
    /// a name derived from the capacity.
    fn identity(stream: &mut dyn SparseStream) -> Result<String, StrataError> {
        let capacity = stream.len();
        if capacity >= 512 {
            let sector = stream.read_vec(0, 512)?;
            if sector[510..512] == BOOT_SIGNATURE {
                let mut reader = ByteReader::new(&sector);
                reader.seek(MBR_SIGNATURE_OFFSET)?;
                let signature = reader.read_u32(Endian::Little)?;
                if signature != 0 {
                    return Ok(format!("mbr-{:08x}", signature));
                }
            }
        }
        Ok(format!("raw-{:x}", capacity))
    }
}

impl DiskContainerPlugin for RawContainer {
    fn name(&self) -> &str {
        "raw"
    }

    /// Any stream made of whole sectors is a valid raw image.
    fn probe(&self, stream: &mut dyn SparseStream) -> Result<bool, StrataError> {
        let len = stream.len();
        Ok(len > 0 && len % 512 == 0)
    }

    fn open(&self, stream: SharedStream, access: FileAccess) -> Result<VirtualDisk, StrataError> {
        let identity = Self::identity(&mut *stream.borrow_mut())?;
        debug!("Opened raw image {} ({:?})", identity, access);
        let content = match access {
            FileAccess::ReadWrite => stream,
            FileAccess::Read => share(ReadOnlyStream::new(stream)),
        };
        Ok(VirtualDisk::new(content, identity))
    }
}
