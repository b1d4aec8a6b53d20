//! Partitioned Parquet storage, one file per (ingestion_date, platform)
//! shard under Hive-style `key=value` paths. Each merge rewrites the whole
//! file through a temp object and rename, so readers never see a partial
//! partition.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDate;
use futures::StreamExt;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use tracing::{debug, warn};

use echotrace_common::{Platform, ReplyRecord};

use crate::error::Result;
use crate::schema::{batch_to_records, records_to_batch, replies_schema};

const PARTITION_FILE: &str = "replies.parquet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub date: NaiveDate,
    pub platform: Platform,
}

impl PartitionKey {
    pub fn prefix(&self) -> String {
        format!("ingestion_date={}/platform={}", self.date, self.platform)
    }

    /// Parse a key from an object path like
    /// `ingestion_date=2026-03-14/platform=instagram/replies.parquet`.
    pub fn parse_path(path: &str) -> Option<PartitionKey> {
        let mut date = None;
        let mut platform = None;
        for segment in path.split('/') {
            if let Some(value) = segment.strip_prefix("ingestion_date=") {
                date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok();
            } else if let Some(value) = segment.strip_prefix("platform=") {
                platform = value.parse::<Platform>().ok();
            }
        }
        Some(PartitionKey {
            date: date?,
            platform: platform?,
        })
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

#[derive(Clone)]
pub struct PartitionStore {
    store: Arc<dyn ObjectStore>,
}

impl PartitionStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn local(root: &str) -> Result<Self> {
        let store = LocalFileSystem::new_with_prefix(root)?;
        Ok(Self::new(Arc::new(store)))
    }

    fn file_path(key: &PartitionKey) -> Path {
        Path::from(format!("{}/{}", key.prefix(), PARTITION_FILE))
    }

    /// Enumerate existing partitions from object metadata alone; no
    /// partition content is read.
    pub async fn list_partitions(&self) -> Result<HashSet<PartitionKey>> {
        let mut keys = HashSet::new();
        let mut stream = self.store.list(None);
        while let Some(entry) = stream.next().await {
            match entry {
                Ok(meta) => {
                    let path = meta.location.to_string();
                    if !path.ends_with(PARTITION_FILE) {
                        continue;
                    }
                    if let Some(key) = PartitionKey::parse_path(&path) {
                        keys.insert(key);
                    }
                }
                Err(e) => warn!(error = %e, "Error listing partition entry"),
            }
        }
        Ok(keys)
    }

    /// Read a whole partition. An absent partition reads as empty.
    pub async fn read(&self, key: &PartitionKey) -> Result<Vec<ReplyRecord>> {
        let bytes = match self.store.get(&Self::file_path(key)).await {
            Ok(result) => result.bytes().await?,
            Err(object_store::Error::NotFound { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)?.build()?;
        let mut records = Vec::new();
        for batch in reader {
            records.extend(batch_to_records(&batch?)?);
        }
        Ok(records)
    }

    /// Replace a partition wholesale: serialize, write to a temp object,
    /// rename over the prior file.
    pub async fn write(&self, key: &PartitionKey, records: &[ReplyRecord]) -> Result<()> {
        let batch = records_to_batch(records)?;

        let mut buffer = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buffer, replies_schema(), None)?;
        writer.write(&batch)?;
        writer.close()?;

        let target = Self::file_path(key);
        let temp = Path::from(format!("{target}.tmp"));
        self.store
            .put(&temp, PutPayload::from(Bytes::from(buffer)))
            .await?;
        self.store.rename(&temp, &target).await?;

        debug!(partition = %key, records = records.len(), "Partition rewritten");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_path_roundtrip() {
        let key = PartitionKey {
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            platform: Platform::TikTok,
        };
        let path = format!("{}/{}", key.prefix(), PARTITION_FILE);
        assert_eq!(PartitionKey::parse_path(&path), Some(key));
    }

    #[test]
    fn parse_path_rejects_foreign_layouts() {
        assert_eq!(PartitionKey::parse_path("some/other/file.parquet"), None);
        assert_eq!(
            PartitionKey::parse_path("ingestion_date=not-a-date/platform=x/replies.parquet"),
            None
        );
        assert_eq!(
            PartitionKey::parse_path("ingestion_date=2026-03-14/platform=myspace/replies.parquet"),
            None
        );
    }
}
