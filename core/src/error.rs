use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrataError {
    #[error("Truncated input: needed {needed} bytes at offset {offset}, {available} available")]
    TruncatedInput {
        offset: u64,
        needed: u64,
        available: u64,
    },

    #[error("Out of range: {length} bytes at offset {offset} exceeds length {capacity}")]
    OutOfRange {
        offset: u64,
        length: u64,
        capacity: u64,
    },

    #[error("Block size mismatch: expected {expected} bytes, got {actual}")]
    BlockSizeMismatch { expected: u64, actual: u64 },

    #[error("Differencing chain exceeds maximum depth of {max_depth}")]
    ChainTooDeep { max_depth: usize },

    #[error("Invalid differencing chain: {0}")]
    InvalidChain(String),

    #[error("Not writable: {0}")]
    Unwritable(String),

    #[error("Insufficient space: requested {requested} sectors, largest free extent is {largest_free}")]
    InsufficientSpace { requested: u64, largest_free: u64 },

    #[error("Partition table full: maximum of {max_entries} entries")]
    TableFull { max_entries: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Closed: {0}")]
    Closed(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Plugin error: {0}")]
    Plugin(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl StrataError {
    /// Wrap an error raised by a format plugin so it reaches the caller unchanged.
    pub fn plugin<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StrataError::Plugin(Box::new(err))
    }

    /// Range check shared by every fixed-length stream.
    pub fn check_range(offset: u64, length: u64, capacity: u64) -> Result<(), StrataError> {
        match offset.checked_add(length) {
            Some(end) if end <= capacity => Ok(()),
            _ => Err(StrataError::OutOfRange {
                offset,
                length,
                capacity,
            }),
        }
    }
}

impl From<StrataError> for std::io::Error {
    fn from(err: StrataError) -> Self {
        match err {
            StrataError::IoError(e) => e,
            StrataError::TruncatedInput { .. } => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, err.to_string())
            }
            StrataError::Unwritable(_) => {
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, err.to_string())
            }
            StrataError::NotFound(_) => {
                std::io::Error::new(std::io::ErrorKind::NotFound, err.to_string())
            }
            other => std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
        }
    }
}
