// Positioned std::io adapter over a SparseStream

use super::SparseStream;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Sequential `Read`/`Write`/`Seek` view of a stream.
///
/// A read at or past the end returns `Ok(0)`; a read straddling the end
/// returns only the bytes before it.
#[derive(Debug)]
pub struct StreamCursor<S> {
    stream: S,
    position: u64,
}

impl<S: SparseStream> StreamCursor<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            position: 0,
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: SparseStream> Read for StreamCursor<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let length = self.stream.len();
        if self.position >= length || buf.is_empty() {
            return Ok(0);
        }
        let count = (length - self.position).min(buf.len() as u64) as usize;
        self.stream.read_at(self.position, &mut buf[..count])?;
        self.position += count as u64;
        Ok(count)
    }
}

impl<S: SparseStream> Write for StreamCursor<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write_at(self.position, buf)?;
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()?;
        Ok(())
    }
}

impl<S: SparseStream> Seek for StreamCursor<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.stream.len().checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        match target {
            Some(position) => {
                self.position = position;
                Ok(position)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::SparseMemoryStream;

    #[test]
    fn test_read_to_end_then_zero() {
        let mut cursor = StreamCursor::new(SparseMemoryStream::from_bytes(&[1, 2, 3, 4, 5]));
        let mut buf = [0u8; 3];
        assert_eq!(cursor.read(&mut buf).unwrap(), 3);
        assert_eq!(cursor.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert_eq!(cursor.read(&mut buf).unwrap(), 0);
        assert_eq!(cursor.position(), 5);
    }

    #[test]
    fn test_seek_and_write() {
        let mut cursor = StreamCursor::new(SparseMemoryStream::new(16));
        cursor.seek(SeekFrom::End(-4)).unwrap();
        cursor.write_all(b"tail").unwrap();
        assert_eq!(cursor.position(), 16);
        assert!(cursor.write_all(b"x").is_err());
        assert!(cursor.seek(SeekFrom::Current(-17)).is_err());

        cursor.seek(SeekFrom::Start(0)).unwrap();
        let mut all = Vec::new();
        cursor.read_to_end(&mut all).unwrap();
        assert_eq!(&all[12..], b"tail");
        assert_eq!(all.len(), 16);
    }
}
