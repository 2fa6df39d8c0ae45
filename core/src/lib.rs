pub mod codec;
pub mod config;
pub mod error;
pub mod geometry;
pub mod stream;

pub use codec::{Bitstream, ByteReader, ByteWriter, Charset, Endian};
pub use config::{BlockCacheSettings, EngineConfig};
pub use error::StrataError;
pub use geometry::{ChsAddress, Geometry};
pub use stream::{
    share, BlockCacheStatistics, BlockCacheStream, BuiltStream, Extent, ExtentKind, FileStream,
    ReadOnlyStream, SharedStream, SparseMemoryStream, SparseStream, StreamCursor, SubStream, ZeroStream,
};
