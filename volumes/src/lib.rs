pub mod manager;
pub mod partition;
pub mod table;

pub use manager::{VolumeInfo, VolumeKind, VolumeManager};
pub use partition::{PartitionRecord, PartitionType};
pub use table::{
    FormatConstructor, PartitionFormatValidator, PartitionTable, PartitionTableFormat,
    PartitionTableRegistry, TableLayout,
};
pub use strata_core::StrataError;
