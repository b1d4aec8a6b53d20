pub mod quota;
pub mod selector;
pub mod traits;

mod poller;
mod requeue;
mod result_writer;
mod submitter;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

use std::sync::Arc;
use std::time::Duration;

use echotrace_common::{JobFilters, JobStatus, Platform, SortOrder};

use crate::quota::QuotaGuard;
use crate::traits::{CollectionApi, JobRepo, PayloadRepo, PostRepo};

/// Engine tunables. Defaults match production cadence; tests shrink the
/// poll loop to a single round.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Reply target when a post carries neither an override nor an
    /// observed count.
    pub default_reply_target: i64,
    /// Platform whose awaiting posts are drained first under a batch cap.
    pub priority_platform: Platform,
    pub default_sort_order: SortOrder,
    /// In-cycle status checks per job before treating it as timed out.
    pub poll_rounds: u32,
    pub poll_interval: Duration,
    /// Timeout requeues allowed before a job takes the failure branch.
    pub max_timeout_requeues: i32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            default_reply_target: 25,
            priority_platform: Platform::TikTok,
            default_sort_order: SortOrder::Newest,
            poll_rounds: 3,
            poll_interval: Duration::from_secs(10),
            max_timeout_requeues: 10,
        }
    }
}

/// The job orchestration engine. Each operation is a bounded,
/// single-threaded pass: quota accounting is read sequentially through the
/// batch, and the outcome of one item can decide whether the next is
/// attempted at all.
///
/// There is no cross-invocation locking. Two overlapping passes can race on
/// the same post; the at-most-one-active-job check is best-effort by design,
/// and the merge engine's identity dedup is the correctness backstop.
pub struct Collector {
    pub(crate) api: Arc<dyn CollectionApi>,
    pub(crate) posts: Arc<dyn PostRepo>,
    pub(crate) jobs: Arc<dyn JobRepo>,
    pub(crate) payloads: Arc<dyn PayloadRepo>,
    pub(crate) config: CollectorConfig,
}

impl Collector {
    pub fn new(
        api: Arc<dyn CollectionApi>,
        posts: Arc<dyn PostRepo>,
        jobs: Arc<dyn JobRepo>,
        payloads: Arc<dyn PayloadRepo>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            api,
            posts,
            jobs,
            payloads,
            config,
        }
    }

    pub(crate) fn quota(&self) -> QuotaGuard<'_> {
        QuotaGuard::new(self.api.as_ref())
    }

    /// Count jobs by status and filters.
    pub async fn count(
        &self,
        status: Option<JobStatus>,
        filters: &JobFilters,
    ) -> anyhow::Result<i64> {
        self.jobs.count(status, filters).await
    }
}
