// Test mocks for the collector engine.
//
// Four mocks matching the four trait boundaries:
// - MockApi (CollectionApi) — scripted submit/status/results/usage
// - MemoryPostRepo (PostRepo) — HashMap-backed post store
// - MemoryJobRepo (JobRepo) — HashMap-backed job store
// - MemoryPayloadRepo (PayloadRepo) — HashMap-backed payload store
//
// Plus helpers for constructing posts, jobs, and a test engine config.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use echotrace_common::{
    CollectionJob, JobFilters, JobStatus, PayloadKey, Platform, Post, PostStatus, SortOrder,
};
use listening_client::{
    CollectionRequest, JobSnapshot, ListeningError, ReplyAuthor, ReplyItem, SubmittedJob,
    UsageSnapshot,
};

use crate::traits::{CollectionApi, JobRepo, PayloadRepo, PostRepo};
use crate::CollectorConfig;

/// Engine config shrunk for tests: one status check per job, no sleeping.
pub fn test_config() -> CollectorConfig {
    CollectorConfig {
        poll_rounds: 1,
        poll_interval: Duration::from_millis(0),
        ..CollectorConfig::default()
    }
}

// ---------------------------------------------------------------------------
// MockApi
// ---------------------------------------------------------------------------

/// Scripted remote API. Submit responses pop from a queue (auto-generating
/// tokens when the queue is empty); statuses and result sets are keyed by
/// job token. Every call is counted so tests can assert "zero remote calls".
pub struct MockApi {
    usage: Mutex<UsageSnapshot>,
    usage_queue: Mutex<VecDeque<UsageSnapshot>>,
    usage_fails: Mutex<bool>,
    submit_queue: Mutex<VecDeque<listening_client::Result<SubmittedJob>>>,
    statuses: Mutex<HashMap<String, String>>,
    status_failures: Mutex<HashSet<String>>,
    results: Mutex<HashMap<String, Option<Vec<ReplyItem>>>>,
    auto_token: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub results_calls: AtomicUsize,
    pub usage_calls: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            usage: Mutex::new(UsageSnapshot { used: 0, limit: 400 }),
            usage_queue: Mutex::new(VecDeque::new()),
            usage_fails: Mutex::new(false),
            submit_queue: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(HashMap::new()),
            status_failures: Mutex::new(HashSet::new()),
            results: Mutex::new(HashMap::new()),
            auto_token: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            results_calls: AtomicUsize::new(0),
            usage_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_usage(&self, used: u64, limit: u64) {
        *self.usage.lock().unwrap() = UsageSnapshot { used, limit };
    }

    pub fn fail_usage(&self) {
        *self.usage_fails.lock().unwrap() = true;
    }

    /// Script a one-shot usage response ahead of the static value, letting a
    /// test change quota between the batch gate and a later inline check.
    pub fn push_usage(&self, used: u64, limit: u64) {
        self.usage_queue
            .lock()
            .unwrap()
            .push_back(UsageSnapshot { used, limit });
    }

    pub fn push_submit(&self, response: listening_client::Result<SubmittedJob>) {
        self.submit_queue.lock().unwrap().push_back(response);
    }

    pub fn set_status(&self, token: &str, status: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(token.to_string(), status.to_string());
    }

    pub fn fail_status(&self, token: &str) {
        self.status_failures.lock().unwrap().insert(token.to_string());
    }

    /// Script the result set for a token. `None` = no result set (404).
    pub fn set_results(&self, token: &str, items: Option<Vec<ReplyItem>>) {
        self.results.lock().unwrap().insert(token.to_string(), items);
    }
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CollectionApi for MockApi {
    async fn submit(
        &self,
        _request: &CollectionRequest,
    ) -> listening_client::Result<SubmittedJob> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(scripted) = self.submit_queue.lock().unwrap().pop_front() {
            return scripted;
        }
        let n = self.auto_token.fetch_add(1, Ordering::SeqCst);
        Ok(SubmittedJob {
            job_token: format!("job-{n}"),
            status: "QUEUED".to_string(),
        })
    }

    async fn job_status(&self, job_token: &str) -> listening_client::Result<JobSnapshot> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.status_failures.lock().unwrap().contains(job_token) {
            return Err(ListeningError::Api {
                status: 500,
                message: "scripted status failure".to_string(),
            });
        }
        let status = self
            .statuses
            .lock()
            .unwrap()
            .get(job_token)
            .cloned()
            .unwrap_or_else(|| "RUNNING".to_string());
        Ok(JobSnapshot {
            job_token: job_token.to_string(),
            status,
            started_at: None,
            finished_at: None,
        })
    }

    async fn results(
        &self,
        job_token: &str,
        _platform: Platform,
    ) -> listening_client::Result<Option<Vec<ReplyItem>>> {
        self.results_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .results
            .lock()
            .unwrap()
            .get(job_token)
            .cloned()
            .unwrap_or(None))
    }

    async fn usage(&self) -> listening_client::Result<UsageSnapshot> {
        self.usage_calls.fetch_add(1, Ordering::SeqCst);
        if *self.usage_fails.lock().unwrap() {
            return Err(ListeningError::Api {
                status: 503,
                message: "usage endpoint down".to_string(),
            });
        }
        if let Some(scripted) = self.usage_queue.lock().unwrap().pop_front() {
            return Ok(scripted);
        }
        Ok(self.usage.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// MemoryPostRepo
// ---------------------------------------------------------------------------

pub struct MemoryPostRepo {
    posts: Mutex<HashMap<Uuid, Post>>,
}

impl MemoryPostRepo {
    pub fn new() -> Self {
        Self {
            posts: Mutex::new(HashMap::new()),
        }
    }

    pub fn add(&self, post: Post) {
        self.posts.lock().unwrap().insert(post.id, post);
    }

    pub fn status_of(&self, id: Uuid) -> Option<PostStatus> {
        self.posts.lock().unwrap().get(&id).map(|p| p.status)
    }

    fn snapshot(&self, id: Uuid) -> Option<Post> {
        self.posts.lock().unwrap().get(&id).cloned()
    }
}

impl Default for MemoryPostRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostRepo for MemoryPostRepo {
    async fn list_awaiting(&self, limit: i64) -> anyhow::Result<Vec<Post>> {
        let mut awaiting: Vec<Post> = self
            .posts
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.status == PostStatus::Awaiting)
            .cloned()
            .collect();
        awaiting.sort_by_key(|p| p.created_at);
        awaiting.truncate(limit as usize);
        Ok(awaiting)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Post>> {
        Ok(self.snapshot(id))
    }

    async fn set_status(&self, id: Uuid, status: PostStatus) -> anyhow::Result<()> {
        let mut posts = self.posts.lock().unwrap();
        let post = posts
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("MemoryPostRepo: unknown post {id}"))?;
        post.status = status;
        post.updated_at = Utc::now();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryJobRepo
// ---------------------------------------------------------------------------

/// Holds a reference to the post repo so campaign/platform/country filters
/// can be resolved, as the SQL store does with a join.
pub struct MemoryJobRepo {
    jobs: Mutex<HashMap<String, CollectionJob>>,
    posts: Arc<MemoryPostRepo>,
}

impl MemoryJobRepo {
    pub fn new(posts: Arc<MemoryPostRepo>) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            posts,
        }
    }

    pub fn add(&self, job: CollectionJob) {
        self.jobs.lock().unwrap().insert(job.job_id.clone(), job);
    }

    pub fn get_sync(&self, job_id: &str) -> Option<CollectionJob> {
        self.jobs.lock().unwrap().get(job_id).cloned()
    }

    fn matches(&self, job: &CollectionJob, filters: &JobFilters) -> bool {
        if let Some(post_id) = filters.post_id {
            if job.post_id != post_id {
                return false;
            }
        }
        if filters.platform.is_none() && filters.campaign.is_none() && filters.country.is_none() {
            return true;
        }
        let Some(post) = self.posts.snapshot(job.post_id) else {
            return false;
        };
        if let Some(platform) = filters.platform {
            if post.platform != platform {
                return false;
            }
        }
        if let Some(campaign) = &filters.campaign {
            if &post.campaign != campaign {
                return false;
            }
        }
        if let Some(country) = &filters.country {
            if &post.country != country {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl JobRepo for MemoryJobRepo {
    async fn insert(&self, job: &CollectionJob) -> anyhow::Result<()> {
        self.jobs
            .lock()
            .unwrap()
            .insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn update(&self, job: &CollectionJob) -> anyhow::Result<()> {
        self.jobs
            .lock()
            .unwrap()
            .insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn list_queued(&self, limit: i64) -> anyhow::Result<Vec<CollectionJob>> {
        let mut queued: Vec<CollectionJob> = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.status == JobStatus::Queued)
            .cloned()
            .collect();
        queued.sort_by_key(|j| j.created_at);
        queued.truncate(limit as usize);
        Ok(queued)
    }

    async fn has_active_job(&self, post_id: Uuid) -> anyhow::Result<bool> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .any(|j| j.post_id == post_id && j.status.is_active()))
    }

    async fn has_active_sibling(&self, post_id: Uuid, job_id: &str) -> anyhow::Result<bool> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .any(|j| j.post_id == post_id && j.job_id != job_id && j.status.is_active()))
    }

    async fn list_empty(
        &self,
        filters: &JobFilters,
        limit: i64,
    ) -> anyhow::Result<Vec<CollectionJob>> {
        let mut empty: Vec<CollectionJob> = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.status == JobStatus::Empty && self.matches(j, filters))
            .cloned()
            .collect();
        empty.sort_by_key(|j| j.updated_at);
        empty.truncate(limit as usize);
        Ok(empty)
    }

    async fn count(&self, status: Option<JobStatus>, filters: &JobFilters) -> anyhow::Result<i64> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| status.map_or(true, |s| j.status == s) && self.matches(j, filters))
            .count() as i64)
    }
}

// ---------------------------------------------------------------------------
// MemoryPayloadRepo
// ---------------------------------------------------------------------------

pub struct MemoryPayloadRepo {
    payloads: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryPayloadRepo {
    pub fn new() -> Self {
        Self {
            payloads: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(&self, key: &PayloadKey, payload: serde_json::Value) {
        self.payloads
            .lock()
            .unwrap()
            .insert(key.object_path(), payload);
    }

    pub fn stored(&self, key: &PayloadKey) -> Option<serde_json::Value> {
        self.payloads.lock().unwrap().get(&key.object_path()).cloned()
    }
}

impl Default for MemoryPayloadRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PayloadRepo for MemoryPayloadRepo {
    async fn get(&self, key: &PayloadKey) -> anyhow::Result<Option<serde_json::Value>> {
        Ok(self.payloads.lock().unwrap().get(&key.object_path()).cloned())
    }

    async fn put(&self, key: &PayloadKey, payload: &serde_json::Value) -> anyhow::Result<String> {
        let path = key.object_path();
        self.payloads
            .lock()
            .unwrap()
            .insert(path.clone(), payload.clone());
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn make_post(platform: Platform) -> Post {
    let now = Utc::now();
    Post {
        id: Uuid::new_v4(),
        platform,
        country: "de".to_string(),
        campaign: "spring".to_string(),
        content_id: Some(format!("content-{}", Uuid::new_v4())),
        author_handle: None,
        keyword_query: None,
        target_override: None,
        observed_reply_count: Some(50),
        status: PostStatus::Awaiting,
        created_at: now,
        updated_at: now,
    }
}

pub fn make_job(post_id: Uuid, job_id: &str) -> CollectionJob {
    let now = Utc::now();
    CollectionJob {
        job_id: job_id.to_string(),
        post_id,
        reply_target: 50,
        sort_order: SortOrder::Newest,
        status: JobStatus::Queued,
        retry_count: 0,
        timeout_count: 0,
        created_at: now,
        updated_at: now,
    }
}

pub fn reply_item(id: &str) -> ReplyItem {
    ReplyItem {
        id: Some(id.to_string()),
        text: Some(format!("reply {id}")),
        author: Some(ReplyAuthor {
            user_name: Some("alice".to_string()),
            name: None,
        }),
        published_at: None,
        like_count: Some(3),
    }
}
