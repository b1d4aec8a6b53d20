//! Incremental merge of raw payloads into partitioned Parquet storage.
//!
//! Each run: enumerate known partitions from metadata, skip documents whose
//! retrieval time falls safely behind their partition's newest stored
//! record, flatten the survivors, and fold them into each affected
//! partition under identity dedup with an atomic whole-file rewrite.
//!
//! The skip heuristic compares against the maximum `fetched_at` stored in
//! the partition's own rows, never the partition file's modification time,
//! which every merge resets.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use echotrace_common::{MergeReport, Platform, ReplyRecord};
use echotrace_store::PayloadStore;

use crate::error::Result;
use crate::flatten::{flatten_document, platform_from_path};
use crate::partition::{PartitionKey, PartitionStore};

/// A document older than the partition maximum by more than this margin is
/// treated as already represented.
const SKIP_SAFETY_BUFFER_HOURS: i64 = 1;

#[derive(Debug, Clone, Default)]
pub struct MergeFilters {
    pub campaign: Option<String>,
    pub platform: Option<Platform>,
}

pub struct PartitionMerger {
    payloads: PayloadStore,
    partitions: PartitionStore,
}

impl PartitionMerger {
    pub fn new(payloads: PayloadStore, partitions: PartitionStore) -> Self {
        Self {
            payloads,
            partitions,
        }
    }

    /// Fold new raw documents into the partition store.
    ///
    /// `skip_timestamp_filter` disables the timestamp heuristic entirely:
    /// every document is downloaded and parsed, and only the identity set
    /// keeps the result duplicate-free. The mode of choice when retrieval
    /// timestamps are suspect.
    pub async fn merge(
        &self,
        filters: &MergeFilters,
        skip_timestamp_filter: bool,
    ) -> Result<MergeReport> {
        let mut report = MergeReport::default();

        let known = self.partitions.list_partitions().await?;
        let docs = self
            .payloads
            .list_meta(filters.campaign.as_deref())
            .await?;

        // Partition maxima are loaded lazily, at most once per key.
        let mut max_cache: HashMap<PartitionKey, Option<DateTime<Utc>>> = HashMap::new();
        let mut pending: HashMap<PartitionKey, Vec<ReplyRecord>> = HashMap::new();

        for doc in docs {
            let Some(platform) = platform_from_path(&doc.path) else {
                report
                    .errors
                    .push(format!("{}: unrecognized path layout", doc.path));
                continue;
            };
            if let Some(want) = filters.platform {
                if platform != want {
                    continue;
                }
            }
            report.documents_seen += 1;

            let key = PartitionKey {
                date: doc.last_modified.date_naive(),
                platform,
            };

            if !skip_timestamp_filter && known.contains(&key) {
                let max_ts = match max_cache.entry(key) {
                    Entry::Occupied(entry) => *entry.get(),
                    Entry::Vacant(slot) => {
                        let loaded = match self.partitions.read(&key).await {
                            Ok(records) => records.iter().map(|r| r.fetched_at).max(),
                            Err(e) => {
                                // Can't trust the heuristic for this
                                // partition; let identity dedup carry it.
                                warn!(partition = %key, error = %e, "Failed to load partition maximum");
                                report
                                    .errors
                                    .push(format!("{key}: failed to load maximum: {e}"));
                                None
                            }
                        };
                        *slot.insert(loaded)
                    }
                };

                if let Some(max) = max_ts {
                    if doc.last_modified < max - Duration::hours(SKIP_SAFETY_BUFFER_HOURS) {
                        report.skipped_by_timestamp += 1;
                        continue;
                    }
                }
            }

            let value = match self.payloads.get_path(&doc.path).await {
                Ok(Some(value)) => value,
                Ok(None) => {
                    report
                        .errors
                        .push(format!("{}: disappeared during merge", doc.path));
                    continue;
                }
                Err(e) => {
                    report.errors.push(format!("{}: {e}", doc.path));
                    continue;
                }
            };

            match flatten_document(&value, doc.last_modified, key) {
                Ok(records) => {
                    report.documents_parsed += 1;
                    pending.entry(key).or_default().extend(records);
                }
                Err(e) => report.errors.push(format!("{}: {e}", doc.path)),
            }
        }

        // Fold surviving records into their partitions, one partition at a
        // time; a storage fault aborts only the partition it hit.
        let mut keys: Vec<PartitionKey> = pending.keys().copied().collect();
        keys.sort_by_key(|k| (k.date, k.platform.to_string()));

        for key in keys {
            let incoming = pending.remove(&key).unwrap_or_default();

            let existing = match self.partitions.read(&key).await {
                Ok(records) => records,
                Err(e) => {
                    report.errors.push(format!("{key}: read failed: {e}"));
                    continue;
                }
            };

            let mut seen: HashSet<(String, String)> = existing
                .iter()
                .map(|r| (r.source_reference.clone(), r.record_id.clone()))
                .collect();
            let mut merged = existing;
            let mut appended = 0usize;
            for record in incoming {
                if seen.insert((record.source_reference.clone(), record.record_id.clone())) {
                    merged.push(record);
                    appended += 1;
                } else {
                    report.duplicates_dropped += 1;
                }
            }

            if appended == 0 {
                continue;
            }

            match self.partitions.write(&key, &merged).await {
                Ok(()) => {
                    info!(partition = %key, appended, total = merged.len(), "Partition merged");
                    report.partitions_written += 1;
                    report.records_appended += appended;
                }
                Err(e) => report.errors.push(format!("{key}: write failed: {e}")),
            }
        }

        Ok(report)
    }
}
