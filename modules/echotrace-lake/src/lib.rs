pub mod error;
pub mod flatten;
pub mod merge;
pub mod partition;
pub mod schema;

pub use error::{LakeError, Result};
pub use merge::{MergeFilters, PartitionMerger};
pub use partition::{PartitionKey, PartitionStore};
