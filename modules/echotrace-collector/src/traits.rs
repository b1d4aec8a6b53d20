// Trait abstractions for the collector's dependencies.
//
// CollectionApi — the remote collection service (submit, status, results,
//   usage). Keeps the ListeningClient error type so callers can classify
//   rate-limit and forbidden signals.
// PostRepo / JobRepo / PayloadRepo — injected per-entity repositories.
//
// These enable deterministic testing with the mocks in `testing`: no
// network, no database.

use async_trait::async_trait;
use uuid::Uuid;

use echotrace_common::{
    CollectionJob, JobFilters, JobStatus, PayloadKey, Platform, Post, PostStatus,
};
use listening_client::{
    CollectionRequest, JobSnapshot, ListeningClient, ReplyItem, SubmittedJob, UsageSnapshot,
};

// ---------------------------------------------------------------------------
// CollectionApi
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CollectionApi: Send + Sync {
    /// Start an asynchronous collection job.
    async fn submit(&self, request: &CollectionRequest) -> listening_client::Result<SubmittedJob>;

    /// Read a job's remote status.
    async fn job_status(&self, job_token: &str) -> listening_client::Result<JobSnapshot>;

    /// Fetch a finished job's result set. `None` means the provider has no
    /// result set for this token; `Some(vec![])` is an empty collection.
    async fn results(
        &self,
        job_token: &str,
        platform: Platform,
    ) -> listening_client::Result<Option<Vec<ReplyItem>>>;

    /// Rolling-period usage against the call quota.
    async fn usage(&self) -> listening_client::Result<UsageSnapshot>;
}

#[async_trait]
impl CollectionApi for ListeningClient {
    async fn submit(&self, request: &CollectionRequest) -> listening_client::Result<SubmittedJob> {
        self.submit(request).await
    }

    async fn job_status(&self, job_token: &str) -> listening_client::Result<JobSnapshot> {
        self.job_status(job_token).await
    }

    async fn results(
        &self,
        job_token: &str,
        platform: Platform,
    ) -> listening_client::Result<Option<Vec<ReplyItem>>> {
        self.results(job_token, &platform.to_string()).await
    }

    async fn usage(&self) -> listening_client::Result<UsageSnapshot> {
        self.usage().await
    }
}

// ---------------------------------------------------------------------------
// PostRepo
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PostRepo: Send + Sync {
    /// Posts awaiting collection, creation time ascending.
    async fn list_awaiting(&self, limit: i64) -> anyhow::Result<Vec<Post>>;

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Post>>;

    async fn set_status(&self, id: Uuid, status: PostStatus) -> anyhow::Result<()>;
}

#[async_trait]
impl PostRepo for echotrace_store::PostStore {
    async fn list_awaiting(&self, limit: i64) -> anyhow::Result<Vec<Post>> {
        Ok(self.list_awaiting(limit).await?)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Post>> {
        Ok(self.get(id).await?)
    }

    async fn set_status(&self, id: Uuid, status: PostStatus) -> anyhow::Result<()> {
        Ok(self.set_status(id, status).await?)
    }
}

// ---------------------------------------------------------------------------
// JobRepo
// ---------------------------------------------------------------------------

#[async_trait]
pub trait JobRepo: Send + Sync {
    async fn insert(&self, job: &CollectionJob) -> anyhow::Result<()>;

    /// Single-document update keyed by job_id.
    async fn update(&self, job: &CollectionJob) -> anyhow::Result<()>;

    async fn list_queued(&self, limit: i64) -> anyhow::Result<Vec<CollectionJob>>;

    /// Whether the post has any job in queued or polling.
    async fn has_active_job(&self, post_id: Uuid) -> anyhow::Result<bool>;

    /// Whether a different job for the same post is still active.
    async fn has_active_sibling(&self, post_id: Uuid, job_id: &str) -> anyhow::Result<bool>;

    async fn list_empty(
        &self,
        filters: &JobFilters,
        limit: i64,
    ) -> anyhow::Result<Vec<CollectionJob>>;

    async fn count(&self, status: Option<JobStatus>, filters: &JobFilters) -> anyhow::Result<i64>;
}

#[async_trait]
impl JobRepo for echotrace_store::JobStore {
    async fn insert(&self, job: &CollectionJob) -> anyhow::Result<()> {
        Ok(self.insert(job).await?)
    }

    async fn update(&self, job: &CollectionJob) -> anyhow::Result<()> {
        Ok(self.update(job).await?)
    }

    async fn list_queued(&self, limit: i64) -> anyhow::Result<Vec<CollectionJob>> {
        Ok(self.list_queued(limit).await?)
    }

    async fn has_active_job(&self, post_id: Uuid) -> anyhow::Result<bool> {
        Ok(self.has_active_job(post_id).await?)
    }

    async fn has_active_sibling(&self, post_id: Uuid, job_id: &str) -> anyhow::Result<bool> {
        Ok(self.has_active_sibling(post_id, job_id).await?)
    }

    async fn list_empty(
        &self,
        filters: &JobFilters,
        limit: i64,
    ) -> anyhow::Result<Vec<CollectionJob>> {
        Ok(self.list_empty(filters, limit).await?)
    }

    async fn count(&self, status: Option<JobStatus>, filters: &JobFilters) -> anyhow::Result<i64> {
        Ok(self.count(status, filters).await?)
    }
}

// ---------------------------------------------------------------------------
// PayloadRepo
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PayloadRepo: Send + Sync {
    async fn get(&self, key: &PayloadKey) -> anyhow::Result<Option<serde_json::Value>>;

    /// Write a payload, replacing any prior document. Returns the stored
    /// location.
    async fn put(&self, key: &PayloadKey, payload: &serde_json::Value) -> anyhow::Result<String>;
}

#[async_trait]
impl PayloadRepo for echotrace_store::PayloadStore {
    async fn get(&self, key: &PayloadKey) -> anyhow::Result<Option<serde_json::Value>> {
        Ok(self.get(key).await?)
    }

    async fn put(&self, key: &PayloadKey, payload: &serde_json::Value) -> anyhow::Result<String> {
        Ok(self.put(key, payload).await?)
    }
}
