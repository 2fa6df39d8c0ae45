// Endian-aware field codec
// Every read consumes exactly the field width or fails with TruncatedInput.

use crate::StrataError;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endian {
    Little,
    Big,
}

/// Character encodings accepted by the fixed-width string fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Charset {
    Ascii,
    Latin1,
    Utf8,
    Utf16Le,
    Utf16Be,
}

/// Width of the largest single field (a GUID).
pub const MAX_FIELD_WIDTH: usize = 16;

macro_rules! read_field {
    ($self:ident, $endian:ident, $width:expr, $method:ident) => {{
        let bytes = $self.take($width)?;
        Ok(match $endian {
            Endian::Little => LittleEndian::$method(bytes),
            Endian::Big => BigEndian::$method(bytes),
        })
    }};
}

macro_rules! write_field {
    ($self:ident, $endian:ident, $value:ident, $width:expr, $method:ident) => {{
        let mut scratch = [0u8; $width];
        match $endian {
            Endian::Little => LittleEndian::$method(&mut scratch, $value),
            Endian::Big => BigEndian::$method(&mut scratch, $value),
        }
        $self.put(&scratch)
    }};
}

/// Forward-only reader over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn seek(&mut self, position: usize) -> Result<(), StrataError> {
        if position > self.data.len() {
            return Err(StrataError::TruncatedInput {
                offset: self.position as u64,
                needed: (position - self.position) as u64,
                available: self.remaining() as u64,
            });
        }
        self.position = position;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<(), StrataError> {
        self.take(count).map(|_| ())
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], StrataError> {
        if self.remaining() < count {
            return Err(StrataError::TruncatedInput {
                offset: self.position as u64,
                needed: count as u64,
                available: self.remaining() as u64,
            });
        }
        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], StrataError> {
        self.take(count)
    }

    pub fn read_u8(&mut self) -> Result<u8, StrataError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self, endian: Endian) -> Result<u16, StrataError> {
        read_field!(self, endian, 2, read_u16)
    }

    pub fn read_i16(&mut self, endian: Endian) -> Result<i16, StrataError> {
        read_field!(self, endian, 2, read_i16)
    }

    pub fn read_u32(&mut self, endian: Endian) -> Result<u32, StrataError> {
        read_field!(self, endian, 4, read_u32)
    }

    pub fn read_i32(&mut self, endian: Endian) -> Result<i32, StrataError> {
        read_field!(self, endian, 4, read_i32)
    }

    pub fn read_u64(&mut self, endian: Endian) -> Result<u64, StrataError> {
        read_field!(self, endian, 8, read_u64)
    }

    pub fn read_i64(&mut self, endian: Endian) -> Result<i64, StrataError> {
        read_field!(self, endian, 8, read_i64)
    }

    /// Read a GUID stored as `u32, u16, u16, [u8; 8]`.
    ///
    /// Under [`Endian::Little`] each of the three integer fields is byte
    /// swapped on its own; the trailing eight bytes are never swapped.
    pub fn read_guid(&mut self, endian: Endian) -> Result<Uuid, StrataError> {
        if self.remaining() < MAX_FIELD_WIDTH {
            return Err(StrataError::TruncatedInput {
                offset: self.position as u64,
                needed: MAX_FIELD_WIDTH as u64,
                available: self.remaining() as u64,
            });
        }
        let d1 = self.read_u32(endian)?;
        let d2 = self.read_u16(endian)?;
        let d3 = self.read_u16(endian)?;
        let mut d4 = [0u8; 8];
        d4.copy_from_slice(self.take(8)?);
        Ok(Uuid::from_fields(d1, d2, d3, &d4))
    }

    /// Read `byte_count` bytes and decode them; trailing NULs are dropped.
    pub fn read_fixed_string(&mut self, charset: Charset, byte_count: usize) -> Result<String, StrataError> {
        let offset = self.position;
        let bytes = self.take(byte_count)?;
        decode_string(charset, bytes).map_err(|reason| {
            StrataError::InvalidInput(format!("string field at offset {}: {}", offset, reason))
        })
    }
}

/// Writer over a fixed-size mutable slice, as used for on-disk headers.
#[derive(Debug)]
pub struct ByteWriter<'a> {
    data: &'a mut [u8],
    position: usize,
}

impl<'a> ByteWriter<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn seek(&mut self, position: usize) -> Result<(), StrataError> {
        StrataError::check_range(position as u64, 0, self.data.len() as u64)?;
        self.position = position;
        Ok(())
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), StrataError> {
        StrataError::check_range(self.position as u64, bytes.len() as u64, self.data.len() as u64)?;
        self.data[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), StrataError> {
        self.put(bytes)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), StrataError> {
        self.put(&[value])
    }

    pub fn write_u16(&mut self, value: u16, endian: Endian) -> Result<(), StrataError> {
        write_field!(self, endian, value, 2, write_u16)
    }

    pub fn write_u32(&mut self, value: u32, endian: Endian) -> Result<(), StrataError> {
        write_field!(self, endian, value, 4, write_u32)
    }

    pub fn write_i32(&mut self, value: i32, endian: Endian) -> Result<(), StrataError> {
        write_field!(self, endian, value, 4, write_i32)
    }

    pub fn write_u64(&mut self, value: u64, endian: Endian) -> Result<(), StrataError> {
        write_field!(self, endian, value, 8, write_u64)
    }

    pub fn write_i64(&mut self, value: i64, endian: Endian) -> Result<(), StrataError> {
        write_field!(self, endian, value, 8, write_i64)
    }

    pub fn write_guid(&mut self, guid: &Uuid, endian: Endian) -> Result<(), StrataError> {
        let (d1, d2, d3, d4) = guid.as_fields();
        let mut scratch = [0u8; MAX_FIELD_WIDTH];
        {
            let mut inner = ByteWriter::new(&mut scratch);
            inner.write_u32(d1, endian)?;
            inner.write_u16(d2, endian)?;
            inner.write_u16(d3, endian)?;
            inner.write_bytes(d4)?;
        }
        self.put(&scratch)
    }

    /// Encode `value` into exactly `byte_count` bytes, truncating at a
    /// character boundary and zero padding the remainder.
    pub fn write_fixed_string(&mut self, value: &str, charset: Charset, byte_count: usize) -> Result<(), StrataError> {
        StrataError::check_range(self.position as u64, byte_count as u64, self.data.len() as u64)?;
        let encoded = encode_string(charset, value, byte_count)?;
        let field = &mut self.data[self.position..self.position + byte_count];
        field.fill(0);
        field[..encoded.len()].copy_from_slice(&encoded);
        self.position += byte_count;
        Ok(())
    }
}

fn decode_string(charset: Charset, bytes: &[u8]) -> Result<String, String> {
    let text = match charset {
        Charset::Ascii => {
            if let Some(bad) = bytes.iter().find(|b| !b.is_ascii()) {
                return Err(format!("byte {:#04x} is not ASCII", bad));
            }
            bytes.iter().map(|&b| b as char).collect::<String>()
        }
        Charset::Latin1 => bytes.iter().map(|&b| b as char).collect::<String>(),
        Charset::Utf8 => std::str::from_utf8(bytes)
            .map_err(|e| e.to_string())?
            .to_string(),
        Charset::Utf16Le | Charset::Utf16Be => {
            if bytes.len() % 2 != 0 {
                return Err(format!("odd byte count {} for UTF-16", bytes.len()));
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| match charset {
                    Charset::Utf16Le => LittleEndian::read_u16(pair),
                    _ => BigEndian::read_u16(pair),
                })
                .collect();
            String::from_utf16(&units).map_err(|e| e.to_string())?
        }
    };
    Ok(text.trim_end_matches('\0').to_string())
}

fn encode_string(charset: Charset, value: &str, byte_count: usize) -> Result<Vec<u8>, StrataError> {
    let mut out = Vec::with_capacity(byte_count);
    for ch in value.chars() {
        let mut unit = [0u8; 4];
        let encoded: &[u8] = match charset {
            Charset::Ascii if ch.is_ascii() => {
                unit[0] = ch as u8;
                &unit[..1]
            }
            Charset::Latin1 if (ch as u32) <= 0xFF => {
                unit[0] = ch as u32 as u8;
                &unit[..1]
            }
            Charset::Ascii | Charset::Latin1 => {
                return Err(StrataError::InvalidInput(format!(
                    "character {:?} cannot be encoded as {:?}",
                    ch, charset
                )));
            }
            Charset::Utf8 => ch.encode_utf8(&mut unit).as_bytes(),
            Charset::Utf16Le | Charset::Utf16Be => {
                let mut units = [0u16; 2];
                let units = ch.encode_utf16(&mut units);
                for (i, u) in units.iter().enumerate() {
                    let slot = &mut unit[i * 2..i * 2 + 2];
                    if charset == Charset::Utf16Le {
                        LittleEndian::write_u16(slot, *u);
                    } else {
                        BigEndian::write_u16(slot, *u);
                    }
                }
                &unit[..units.len() * 2]
            }
        };
        if out.len() + encoded.len() > byte_count {
            break;
        }
        out.extend_from_slice(encoded);
    }
    Ok(out)
}
