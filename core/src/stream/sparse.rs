// In-memory sparse storage
// Only written ranges hold bytes; runs are kept coalesced and non-overlapping.

use super::{Extent, SparseStream};
use crate::StrataError;
use std::collections::BTreeMap;

/// Ordered map of present runs keyed by start offset.
///
/// Invariant: runs never overlap and never touch; a write that meets or
/// overlaps existing runs merges them into one.
#[derive(Debug, Clone, Default)]
pub struct SparseBuffer {
    runs: BTreeMap<u64, Vec<u8>>,
}

impl SparseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, offset: u64, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let end = offset + data.len() as u64;

        // Runs starting at or before `end` that reach at least `offset`.
        let touching: Vec<u64> = self
            .runs
            .range(..=end)
            .rev()
            .take_while(|(&start, run)| start + run.len() as u64 >= offset)
            .map(|(&start, _)| start)
            .collect();

        if touching.is_empty() {
            self.runs.insert(offset, data.to_vec());
            return;
        }

        let merged_start = touching.iter().copied().min().unwrap_or(offset).min(offset);
        let merged_end = touching
            .iter()
            .map(|start| start + self.runs[start].len() as u64)
            .max()
            .unwrap_or(end)
            .max(end);

        let mut merged = vec![0u8; (merged_end - merged_start) as usize];
        for start in touching {
            if let Some(run) = self.runs.remove(&start) {
                let at = (start - merged_start) as usize;
                merged[at..at + run.len()].copy_from_slice(&run);
            }
        }
        let at = (offset - merged_start) as usize;
        merged[at..at + data.len()].copy_from_slice(data);
        self.runs.insert(merged_start, merged);
    }

    /// Fill `buf` from `offset`; bytes outside every run are zero.
    pub fn read(&self, offset: u64, buf: &mut [u8]) {
        buf.fill(0);
        let end = offset + buf.len() as u64;

        let first = self
            .runs
            .range(..=offset)
            .next_back()
            .map(|(&start, _)| start)
            .unwrap_or(offset);

        for (&start, run) in self.runs.range(first..end) {
            let run_end = start + run.len() as u64;
            let lo = start.max(offset);
            let hi = run_end.min(end);
            if lo >= hi {
                continue;
            }
            buf[(lo - offset) as usize..(hi - offset) as usize]
                .copy_from_slice(&run[(lo - start) as usize..(hi - start) as usize]);
        }
    }

    /// Drop everything at or beyond `length`.
    pub fn truncate(&mut self, length: u64) {
        let beyond: Vec<u64> = self.runs.range(length..).map(|(&start, _)| start).collect();
        for start in beyond {
            self.runs.remove(&start);
        }
        if let Some((&start, run)) = self.runs.range_mut(..length).next_back() {
            let keep = (length - start) as usize;
            if run.len() > keep {
                run.truncate(keep);
            }
        }
    }

    pub fn extents(&self) -> Vec<Extent> {
        self.runs
            .iter()
            .map(|(&start, run)| Extent::present(start, run.len() as u64))
            .collect()
    }

    /// Bytes of backing storage in use.
    pub fn allocated_bytes(&self) -> u64 {
        self.runs.values().map(|run| run.len() as u64).sum()
    }

    pub fn clear(&mut self) {
        self.runs.clear();
    }
}

/// A [`SparseStream`] over a [`SparseBuffer`] with a declared length.
#[derive(Debug, Clone)]
pub struct SparseMemoryStream {
    buffer: SparseBuffer,
    length: u64,
    growable: bool,
    writable: bool,
}

impl SparseMemoryStream {
    /// Fixed-length, writable, initially all zero.
    pub fn new(length: u64) -> Self {
        Self {
            buffer: SparseBuffer::new(),
            length,
            growable: false,
            writable: true,
        }
    }

    /// Zero-length stream that extends on writes past its end.
    pub fn growable() -> Self {
        Self {
            growable: true,
            ..Self::new(0)
        }
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        let mut stream = Self::new(data.len() as u64);
        stream.buffer.write(0, data);
        stream
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self.growable = false;
        self
    }

    pub fn buffer(&self) -> &SparseBuffer {
        &self.buffer
    }
}

impl SparseStream for SparseMemoryStream {
    fn len(&self) -> u64 {
        self.length
    }

    fn can_write(&self) -> bool {
        self.writable
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StrataError> {
        StrataError::check_range(offset, buf.len() as u64, self.length)?;
        self.buffer.read(offset, buf);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), StrataError> {
        if !self.writable {
            return Err(StrataError::Unwritable("memory stream is read-only".to_string()));
        }
        let out_of_range = || StrataError::OutOfRange {
            offset,
            length: data.len() as u64,
            capacity: self.length,
        };
        let end = offset.checked_add(data.len() as u64).ok_or_else(out_of_range)?;
        if end > self.length {
            if !self.growable {
                return Err(out_of_range());
            }
            self.length = end;
        }
        self.buffer.write(offset, data);
        Ok(())
    }

    fn set_length(&mut self, length: u64) -> Result<(), StrataError> {
        if !self.writable {
            return Err(StrataError::Unwritable("memory stream is read-only".to_string()));
        }
        if length < self.length {
            self.buffer.truncate(length);
        }
        self.length = length;
        Ok(())
    }

    fn extents(&self) -> Vec<Extent> {
        self.buffer.extents()
    }
}
