use thiserror::Error;

pub type Result<T> = std::result::Result<T, LakeError>;

#[derive(Debug, Error)]
pub enum LakeError {
    #[error("Storage error: {0}")]
    Store(#[from] echotrace_store::StoreError),

    #[error("Object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Malformed document: {0}")]
    Malformed(String),
}
