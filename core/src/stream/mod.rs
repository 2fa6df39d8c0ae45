// Sparse stream model
// A stream has a declared length; only its present extents occupy storage and
// every other byte reads as zero.

pub mod block_cache;
pub mod built;
pub mod cursor;
pub mod extent;
pub mod file;
pub mod readonly;
pub mod sparse;
pub mod substream;
pub mod zero;

pub use block_cache::{BlockCacheStatistics, BlockCacheStream};
pub use built::{BufferExtent, BuilderExtent, BuiltStream, StreamExtent};
pub use cursor::StreamCursor;
pub use extent::{Extent, ExtentKind};
pub use file::FileStream;
pub use readonly::ReadOnlyStream;
pub use sparse::{SparseBuffer, SparseMemoryStream};
pub use substream::SubStream;
pub use zero::ZeroStream;

use crate::StrataError;
use std::cell::RefCell;
use std::rc::Rc;

/// Random-access stream over a logical address space of declared length.
///
/// `read_at` fills the whole buffer or fails; reading beyond `len()` is
/// `OutOfRange`. Sequential end-of-stream behaviour lives in [`StreamCursor`].
pub trait SparseStream {
    /// Declared length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn can_write(&self) -> bool {
        false
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StrataError>;

    fn write_at(&mut self, _offset: u64, _data: &[u8]) -> Result<(), StrataError> {
        Err(StrataError::Unwritable("stream is read-only".to_string()))
    }

    fn set_length(&mut self, _length: u64) -> Result<(), StrataError> {
        Err(StrataError::Unwritable("stream length is fixed".to_string()))
    }

    /// Present extents, ascending by offset. Gaps read as zero.
    fn extents(&self) -> Vec<Extent>;

    fn extents_in_range(&self, offset: u64, length: u64) -> Vec<Extent> {
        extent::clip(&self.extents(), offset, length)
    }

    fn flush(&mut self) -> Result<(), StrataError> {
        Ok(())
    }

    fn read_vec(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, StrataError> {
        let mut buf = vec![0u8; length];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}

/// Stream handle shared between several views (volumes, builder extents).
///
/// Not thread-safe; callers serialize access across threads.
pub type SharedStream = Rc<RefCell<dyn SparseStream>>;

pub fn share<S: SparseStream + 'static>(stream: S) -> SharedStream {
    Rc::new(RefCell::new(stream))
}

macro_rules! forward_sparse_stream {
    ($self:ident, $get:expr, $get_mut:expr) => {
        fn len(&$self) -> u64 {
            $get.len()
        }

        fn can_write(&$self) -> bool {
            $get.can_write()
        }

        fn read_at(&mut $self, offset: u64, buf: &mut [u8]) -> Result<(), StrataError> {
            $get_mut.read_at(offset, buf)
        }

        fn write_at(&mut $self, offset: u64, data: &[u8]) -> Result<(), StrataError> {
            $get_mut.write_at(offset, data)
        }

        fn set_length(&mut $self, length: u64) -> Result<(), StrataError> {
            $get_mut.set_length(length)
        }

        fn extents(&$self) -> Vec<Extent> {
            $get.extents()
        }

        fn extents_in_range(&$self, offset: u64, length: u64) -> Vec<Extent> {
            $get.extents_in_range(offset, length)
        }

        fn flush(&mut $self) -> Result<(), StrataError> {
            $get_mut.flush()
        }
    };
}

impl<S: SparseStream + ?Sized> SparseStream for Rc<RefCell<S>> {
    forward_sparse_stream!(self, self.borrow(), self.borrow_mut());
}

impl<S: SparseStream + ?Sized> SparseStream for Box<S> {
    forward_sparse_stream!(self, (**self), (**self));
}

impl<S: SparseStream + ?Sized> SparseStream for &mut S {
    forward_sparse_stream!(self, (**self), (**self));
}
