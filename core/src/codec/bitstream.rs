// Bit-level reader for packed / Huffman-coded payloads
//
// The accumulator is a left-justified 32-bit buffer: the next unread bit is
// always bit 31. Refills pull whole bytes while at most 24 bits are buffered,
// so a peek of up to 25 bits is always satisfied. Bytes fetched past the end
// of the data read as zero; `overflow` reports when any of those phantom bits
// have actually been consumed.

/// Largest bit count a single `peek`/`read` may request.
pub const MAX_PEEK_BITS: u32 = 25;

#[derive(Debug, Clone)]
pub struct Bitstream<'a> {
    data: &'a [u8],
    length: usize,
    position: usize,
    buffer: u32,
    bits: u32,
}

impl<'a> Bitstream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_length(data, data.len())
    }

    /// Read at most `length` bytes of `data`.
    pub fn with_length(data: &'a [u8], length: usize) -> Self {
        Self {
            data,
            length: length.min(data.len()),
            position: 0,
            buffer: 0,
            bits: 0,
        }
    }

    /// Byte cursor into the source (includes bytes buffered but not yet consumed).
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn buffered_bits(&self) -> u32 {
        self.bits
    }

    fn refill(&mut self) {
        while self.bits <= 24 {
            let byte = if self.position < self.length {
                self.data[self.position]
            } else {
                0
            };
            self.position += 1;
            self.buffer |= (byte as u32) << (24 - self.bits);
            self.bits += 8;
        }
    }

    /// Return the next `count` bits without consuming them.
    pub fn peek(&mut self, count: u32) -> u32 {
        debug_assert!(count <= MAX_PEEK_BITS, "peek of {} bits", count);
        if count == 0 {
            return 0;
        }
        self.refill();
        self.buffer >> (32 - count)
    }

    /// Discard `count` bits that were previously peeked.
    pub fn remove(&mut self, count: u32) {
        debug_assert!(count <= self.bits, "removing {} of {} buffered bits", count, self.bits);
        let count = count.min(self.bits);
        self.buffer = if count >= 32 { 0 } else { self.buffer << count };
        self.bits -= count;
    }

    pub fn read(&mut self, count: u32) -> u32 {
        let value = self.peek(count);
        self.remove(count);
        value
    }

    /// True once bits beyond the declared data length have been consumed.
    pub fn overflow(&self) -> bool {
        let phantom_bytes = self.position.saturating_sub(self.length) as u64;
        phantom_bytes * 8 > self.bits as u64
    }

    /// Drop any buffered bits and rewind the byte cursor to the boundary
    /// after the last byte that was at least partly consumed.
    ///
    /// Returns the new byte offset.
    pub fn flush(&mut self) -> usize {
        self.position -= (self.bits / 8) as usize;
        self.buffer = 0;
        self.bits = 0;
        self.position
    }
}
