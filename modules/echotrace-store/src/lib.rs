pub mod error;
pub mod payload;
pub mod postgres;

pub use error::{Result, StoreError};
pub use payload::{PayloadMeta, PayloadStore};
pub use postgres::{migrate, JobStore, PostStore};
