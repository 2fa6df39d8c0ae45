// File-backed stream for image files on the host filesystem

use super::{Extent, SparseStream};
use crate::StrataError;
use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// A host file presented as a fully present stream.
#[derive(Debug)]
pub struct FileStream {
    file: File,
    length: u64,
    writable: bool,
}

impl FileStream {
    pub fn open(path: &Path, writable: bool) -> Result<Self, StrataError> {
        let file = OpenOptions::new().read(true).write(writable).open(path)?;
        let length = file.metadata()?.len();
        debug!("Opened {} ({} bytes, writable: {})", path.display(), length, writable);
        Ok(Self {
            file,
            length,
            writable,
        })
    }

    /// Create (or truncate) a file of `length` bytes.
    pub fn create(path: &Path, length: u64) -> Result<Self, StrataError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(length)?;
        Ok(Self {
            file,
            length,
            writable: true,
        })
    }

    pub fn from_file(file: File, writable: bool) -> Result<Self, StrataError> {
        let length = file.metadata()?.len();
        Ok(Self {
            file,
            length,
            writable,
        })
    }
}

impl SparseStream for FileStream {
    fn len(&self) -> u64 {
        self.length
    }

    fn can_write(&self) -> bool {
        self.writable
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StrataError> {
        StrataError::check_range(offset, buf.len() as u64, self.length)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), StrataError> {
        if !self.writable {
            return Err(StrataError::Unwritable("file opened read-only".to_string()));
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.length = self.length.max(offset + data.len() as u64);
        Ok(())
    }

    fn set_length(&mut self, length: u64) -> Result<(), StrataError> {
        if !self.writable {
            return Err(StrataError::Unwritable("file opened read-only".to_string()));
        }
        self.file.set_len(length)?;
        self.length = length;
        Ok(())
    }

    fn extents(&self) -> Vec<Extent> {
        if self.length == 0 {
            Vec::new()
        } else {
            vec![Extent::present(0, self.length)]
        }
    }

    fn flush(&mut self) -> Result<(), StrataError> {
        self.file.flush()?;
        Ok(())
    }
}
