// Deterministic binary codec shared by every format plugin

pub mod bitstream;
pub mod endian;

pub use bitstream::Bitstream;
pub use endian::{ByteReader, ByteWriter, Charset, Endian};
