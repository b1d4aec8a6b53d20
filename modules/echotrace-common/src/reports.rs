//! Batch result types returned by the core operations.

use serde::Serialize;

/// Why a submit batch stopped before exhausting its candidates. The first
/// submit failure halts the batch: it usually signals a systemic condition
/// (quota, outage) and continuing would waste calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum SubmitStop {
    QuotaExhausted { used: u64, limit: u64 },
    RateLimited,
    Forbidden,
    RemoteError { status: u16 },
    Unreachable,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SubmitReport {
    /// Posts examined by the selector.
    pub examined: usize,
    /// Jobs created (remote submit succeeded, job persisted).
    pub submitted: usize,
    pub skipped_zero_target: usize,
    pub skipped_existing_payload: usize,
    pub skipped_active_job: usize,
    pub skipped_malformed: usize,
    pub stopped: Option<SubmitStop>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PollReport {
    /// Jobs actually touched this batch. Zero when the quota gate fired.
    pub processed: usize,
    pub completed: usize,
    pub empty: usize,
    pub failed: usize,
    pub quota_blocked: usize,
    pub requeued: usize,
    /// Job ids left untouched in `queued` when the quota gate fires.
    pub still_queued: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RequeueReport {
    pub found: usize,
    pub requeued: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    /// Raw documents enumerated from the payload store.
    pub documents_seen: usize,
    /// Documents skipped by the timestamp heuristic without being read.
    pub skipped_by_timestamp: usize,
    pub documents_parsed: usize,
    pub partitions_written: usize,
    pub records_appended: usize,
    /// Records dropped because their identity already existed in the
    /// partition.
    pub duplicates_dropped: usize,
    pub errors: Vec<String>,
}
