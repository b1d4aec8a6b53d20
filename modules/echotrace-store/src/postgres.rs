// Postgres persistence for posts and collection jobs. All writes are
// single-row upserts; there are no multi-row transactions, so overlapping
// batch invocations can interleave (accepted, see the selector's
// best-effort active-job check).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use echotrace_common::{CollectionJob, JobFilters, JobStatus, Platform, Post, PostStatus};

use crate::error::{Result, StoreError};

/// Run the embedded SQL migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    platform: String,
    country: String,
    campaign: String,
    content_id: Option<String>,
    author_handle: Option<String>,
    keyword_query: Option<String>,
    target_override: Option<i64>,
    observed_reply_count: Option<i64>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PostRow> for Post {
    type Error = StoreError;

    fn try_from(row: PostRow) -> Result<Post> {
        Ok(Post {
            id: row.id,
            platform: row.platform.parse::<Platform>().map_err(StoreError::Corrupt)?,
            country: row.country,
            campaign: row.campaign,
            content_id: row.content_id,
            author_handle: row.author_handle,
            keyword_query: row.keyword_query,
            target_override: row.target_override,
            observed_reply_count: row.observed_reply_count,
            status: row.status.parse::<PostStatus>().map_err(StoreError::Corrupt)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct JobRow {
    job_id: String,
    post_id: Uuid,
    reply_target: i64,
    sort_order: String,
    status: String,
    retry_count: i32,
    timeout_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for CollectionJob {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<CollectionJob> {
        Ok(CollectionJob {
            job_id: row.job_id,
            post_id: row.post_id,
            reply_target: row.reply_target,
            sort_order: row.sort_order.parse().map_err(StoreError::Corrupt)?,
            status: row.status.parse::<JobStatus>().map_err(StoreError::Corrupt)?,
            retry_count: row.retry_count,
            timeout_count: row.timeout_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// PostStore
// ---------------------------------------------------------------------------

pub struct PostStore {
    pool: PgPool,
}

impl PostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Posts awaiting collection, oldest first.
    pub async fn list_awaiting(&self, limit: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT * FROM posts
            WHERE status = 'awaiting'
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Post::try_from).collect()
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>("SELECT * FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Post::try_from).transpose()
    }

    pub async fn set_status(&self, id: Uuid, status: PostStatus) -> Result<()> {
        sqlx::query("UPDATE posts SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Single-row upsert, used by upstream ingestion and seeding.
    pub async fn upsert(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts
                (id, platform, country, campaign, content_id, author_handle,
                 keyword_query, target_override, observed_reply_count, status,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                target_override = EXCLUDED.target_override,
                observed_reply_count = EXCLUDED.observed_reply_count,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(post.id)
        .bind(post.platform.to_string())
        .bind(&post.country)
        .bind(&post.campaign)
        .bind(&post.content_id)
        .bind(&post.author_handle)
        .bind(&post.keyword_query)
        .bind(post.target_override)
        .bind(post.observed_reply_count)
        .bind(post.status.to_string())
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JobStore
// ---------------------------------------------------------------------------

pub struct JobStore {
    pool: PgPool,
}

impl JobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, job: &CollectionJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO collection_jobs
                (job_id, post_id, reply_target, sort_order, status,
                 retry_count, timeout_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&job.job_id)
        .bind(job.post_id)
        .bind(job.reply_target)
        .bind(job.sort_order.to_string())
        .bind(job.status.to_string())
        .bind(job.retry_count)
        .bind(job.timeout_count)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Single-row update keyed by job_id. The job document is reused across
    /// retries; only status, counters, and updated_at change.
    pub async fn update(&self, job: &CollectionJob) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE collection_jobs
            SET status = $2, retry_count = $3, timeout_count = $4, updated_at = now()
            WHERE job_id = $1
            "#,
        )
        .bind(&job.job_id)
        .bind(job.status.to_string())
        .bind(job.retry_count)
        .bind(job.timeout_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, job_id: &str) -> Result<Option<CollectionJob>> {
        let row =
            sqlx::query_as::<_, JobRow>("SELECT * FROM collection_jobs WHERE job_id = $1")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(CollectionJob::try_from).transpose()
    }

    /// Jobs in `queued`, oldest first, for the poll batch.
    pub async fn list_queued(&self, limit: i64) -> Result<Vec<CollectionJob>> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM collection_jobs
            WHERE status = 'queued'
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CollectionJob::try_from).collect()
    }

    /// Whether the post has any job in queued or polling.
    pub async fn has_active_job(&self, post_id: Uuid) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM collection_jobs
            WHERE post_id = $1 AND status IN ('queued', 'polling')
            "#,
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Whether a sibling job (different job_id) of the post is still active.
    pub async fn has_active_sibling(&self, post_id: Uuid, job_id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM collection_jobs
            WHERE post_id = $1 AND job_id <> $2 AND status IN ('queued', 'polling')
            "#,
        )
        .bind(post_id)
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Jobs in `empty` matching the filters, oldest resolution first.
    pub async fn list_empty(&self, filters: &JobFilters, limit: i64) -> Result<Vec<CollectionJob>> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT j.* FROM collection_jobs j
            JOIN posts p ON p.id = j.post_id
            WHERE j.status = 'empty'
              AND ($1::text IS NULL OR p.platform = $1)
              AND ($2::text IS NULL OR p.campaign = $2)
              AND ($3::text IS NULL OR p.country = $3)
              AND ($4::uuid IS NULL OR j.post_id = $4)
            ORDER BY j.updated_at ASC
            LIMIT $5
            "#,
        )
        .bind(filters.platform.map(|p| p.to_string()))
        .bind(&filters.campaign)
        .bind(&filters.country)
        .bind(filters.post_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CollectionJob::try_from).collect()
    }

    pub async fn count(&self, status: Option<JobStatus>, filters: &JobFilters) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM collection_jobs j
            JOIN posts p ON p.id = j.post_id
            WHERE ($1::text IS NULL OR j.status = $1)
              AND ($2::text IS NULL OR p.platform = $2)
              AND ($3::text IS NULL OR p.campaign = $3)
              AND ($4::text IS NULL OR p.country = $4)
              AND ($5::uuid IS NULL OR j.post_id = $5)
            "#,
        )
        .bind(status.map(|s| s.to_string()))
        .bind(filters.platform.map(|p| p.to_string()))
        .bind(&filters.campaign)
        .bind(&filters.country)
        .bind(filters.post_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
