// Streams assembled from positioned pieces
// Used to emit disk images: headers and tables as in-memory buffers, payload
// as windows onto other streams. Anything not covered reads as zero.

use super::extent::{self, Extent};
use super::{SharedStream, SparseStream};
use crate::StrataError;
use log::debug;

/// One positioned piece of a [`BuiltStream`].
pub trait BuilderExtent {
    /// Offset of the piece within the built stream.
    fn start(&self) -> u64;

    fn length(&self) -> u64;

    /// Fill `buf` from `offset` bytes into this piece.
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StrataError>;

    /// Present ranges, in built-stream coordinates.
    fn present_extents(&self) -> Vec<Extent> {
        vec![Extent::present(self.start(), self.length())]
    }
}

/// Fixed bytes placed at `start`.
#[derive(Debug, Clone)]
pub struct BufferExtent {
    start: u64,
    data: Vec<u8>,
}

impl BufferExtent {
    pub fn new(start: u64, data: Vec<u8>) -> Self {
        Self { start, data }
    }
}

impl BuilderExtent for BufferExtent {
    fn start(&self) -> u64 {
        self.start
    }

    fn length(&self) -> u64 {
        self.data.len() as u64
    }

    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StrataError> {
        StrataError::check_range(offset, buf.len() as u64, self.length())?;
        let at = offset as usize;
        buf.copy_from_slice(&self.data[at..at + buf.len()]);
        Ok(())
    }
}

/// A window `[source_offset, source_offset + length)` of a shared stream
/// placed at `start`. Bytes past the end of the source read as zero.
pub struct StreamExtent {
    start: u64,
    source: SharedStream,
    source_offset: u64,
    length: u64,
}

impl StreamExtent {
    pub fn new(start: u64, source: SharedStream, source_offset: u64, length: u64) -> Self {
        Self {
            start,
            source,
            source_offset,
            length,
        }
    }

    /// The whole of `source` placed at `start`.
    pub fn whole(start: u64, source: SharedStream) -> Self {
        let length = source.borrow().len();
        Self::new(start, source, 0, length)
    }
}

impl BuilderExtent for StreamExtent {
    fn start(&self) -> u64 {
        self.start
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StrataError> {
        StrataError::check_range(offset, buf.len() as u64, self.length)?;
        let mut source = self.source.borrow_mut();
        let from = self.source_offset + offset;
        let available = source.len().saturating_sub(from).min(buf.len() as u64) as usize;
        let (head, tail) = buf.split_at_mut(available);
        if !head.is_empty() {
            source.read_at(from, head)?;
        }
        tail.fill(0);
        Ok(())
    }

    fn present_extents(&self) -> Vec<Extent> {
        self.source
            .borrow()
            .extents_in_range(self.source_offset, self.length)
            .iter()
            .map(|e| e.rebase(self.source_offset, self.start))
            .collect()
    }
}

/// Read-only stream of declared length made from non-overlapping pieces.
pub struct BuiltStream {
    length: u64,
    pieces: Vec<Box<dyn BuilderExtent>>,
}

impl BuiltStream {
    /// Pieces are sorted by start. Overlapping pieces are rejected with
    /// `InvalidInput`; pieces reaching past `length` are clipped on read.
    pub fn new(length: u64, mut pieces: Vec<Box<dyn BuilderExtent>>) -> Result<Self, StrataError> {
        pieces.retain(|p| p.length() > 0);
        pieces.sort_by_key(|p| p.start());
        for pair in pieces.windows(2) {
            if pair[0].start() + pair[0].length() > pair[1].start() {
                return Err(StrataError::InvalidInput(format!(
                    "builder extents overlap at offset {}",
                    pair[1].start()
                )));
            }
        }
        debug!("Built stream of {} bytes from {} extents", length, pieces.len());
        Ok(Self { length, pieces })
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }
}

impl SparseStream for BuiltStream {
    fn len(&self) -> u64 {
        self.length
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StrataError> {
        StrataError::check_range(offset, buf.len() as u64, self.length)?;
        buf.fill(0);
        let end = offset + buf.len() as u64;
        for piece in self.pieces.iter_mut() {
            let piece_start = piece.start();
            if piece_start >= end {
                break;
            }
            let piece_end = piece_start + piece.length();
            let lo = piece_start.max(offset);
            let hi = piece_end.min(end);
            if lo >= hi {
                continue;
            }
            piece.read(
                lo - piece_start,
                &mut buf[(lo - offset) as usize..(hi - offset) as usize],
            )?;
        }
        Ok(())
    }

    fn extents(&self) -> Vec<Extent> {
        let all = self.pieces.iter().flat_map(|p| p.present_extents());
        extent::clip(&extent::coalesce(all), 0, self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{share, SparseMemoryStream, StreamCursor};
    use std::io::Read;

    #[test]
    fn test_declared_length_pads_with_zeros() {
        let pieces: Vec<Box<dyn BuilderExtent>> = vec![Box::new(BufferExtent::new(0, vec![0xAB; 100]))];
        let built = BuiltStream::new(1024, pieces).unwrap();
        let mut cursor = StreamCursor::new(built);

        let mut contents = Vec::new();
        cursor.read_to_end(&mut contents).unwrap();
        assert_eq!(contents.len(), 1024);
        assert!(contents[..100].iter().all(|&b| b == 0xAB));
        assert!(contents[100..].iter().all(|&b| b == 0));
        assert_eq!(cursor.position(), 1024);

        let mut buf = [0u8; 8];
        assert_eq!(cursor.read(&mut buf).unwrap(), 0);
        assert_eq!(cursor.get_ref().extents(), vec![Extent::present(0, 100)]);
    }

    #[test]
    fn test_stream_extent_maps_source_window() {
        let source = share(SparseMemoryStream::new(64));
        source.borrow_mut().write_at(16, &[5; 8]).unwrap();

        let pieces: Vec<Box<dyn BuilderExtent>> = vec![
            Box::new(BufferExtent::new(0, b"HDR!".to_vec())),
            Box::new(StreamExtent::new(512, source.clone(), 8, 32)),
        ];
        let mut built = BuiltStream::new(1024, pieces).unwrap();
        assert_eq!(built.piece_count(), 2);

        let data = built.read_vec(0, 1024).unwrap();
        assert_eq!(&data[..4], b"HDR!");
        assert_eq!(&data[520..528], &[5; 8]);
        assert_eq!(data[519], 0);
        assert_eq!(
            built.extents(),
            vec![Extent::present(0, 4), Extent::present(520, 8)]
        );
        assert!(matches!(built.write_at(0, b"x"), Err(StrataError::Unwritable(_))));
    }

    #[test]
    fn test_source_shorter_than_window_reads_zero() {
        let source = share(SparseMemoryStream::from_bytes(&[1, 2, 3, 4]));
        let pieces: Vec<Box<dyn BuilderExtent>> = vec![Box::new(StreamExtent::new(0, source, 2, 8))];
        let mut built = BuiltStream::new(8, pieces).unwrap();
        assert_eq!(built.read_vec(0, 8).unwrap(), vec![3, 4, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_overlapping_pieces_rejected() {
        let pieces: Vec<Box<dyn BuilderExtent>> = vec![
            Box::new(BufferExtent::new(0, vec![1; 10])),
            Box::new(BufferExtent::new(5, vec![2; 10])),
        ];
        assert!(matches!(
            BuiltStream::new(32, pieces),
            Err(StrataError::InvalidInput(_))
        ));
    }
}
