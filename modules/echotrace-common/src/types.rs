use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Instagram,
    Facebook,
    X,
    #[serde(rename = "tiktok")]
    TikTok,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Instagram => write!(f, "instagram"),
            Platform::Facebook => write!(f, "facebook"),
            Platform::X => write!(f, "x"),
            Platform::TikTok => write!(f, "tiktok"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instagram" => Ok(Platform::Instagram),
            "facebook" => Ok(Platform::Facebook),
            "x" => Ok(Platform::X),
            "tiktok" => Ok(Platform::TikTok),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// Lifecycle of a tracked post whose replies are being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Awaiting,
    InProgress,
    Complete,
    Skipped,
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostStatus::Awaiting => write!(f, "awaiting"),
            PostStatus::InProgress => write!(f, "in_progress"),
            PostStatus::Complete => write!(f, "complete"),
            PostStatus::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting" => Ok(PostStatus::Awaiting),
            "in_progress" => Ok(PostStatus::InProgress),
            "complete" => Ok(PostStatus::Complete),
            "skipped" => Ok(PostStatus::Skipped),
            other => Err(format!("unknown post status: {other}")),
        }
    }
}

/// Lifecycle of one asynchronous remote collection job.
///
/// `Empty` is terminal until a manual requeue: the remote job completed but
/// found nothing, and resubmitting automatically would burn quota on posts
/// with no real replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Polling,
    Complete,
    Failed,
    QuotaBlocked,
    Empty,
    Reviewed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Polling => write!(f, "polling"),
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::QuotaBlocked => write!(f, "quota_blocked"),
            JobStatus::Empty => write!(f, "empty"),
            JobStatus::Reviewed => write!(f, "reviewed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "polling" => Ok(JobStatus::Polling),
            "complete" => Ok(JobStatus::Complete),
            "failed" => Ok(JobStatus::Failed),
            "quota_blocked" => Ok(JobStatus::QuotaBlocked),
            "empty" => Ok(JobStatus::Empty),
            "reviewed" => Ok(JobStatus::Reviewed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

impl JobStatus {
    /// A job still owned by the collection pipeline. At most one active job
    /// per post is the (best-effort) invariant the selector checks.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Polling)
    }
}

/// Result ordering requested from the remote API. Only honored by keyword
/// queries; content-id and account lookups ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Newest,
    MostEngaged,
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Newest => write!(f, "newest"),
            SortOrder::MostEngaged => write!(f, "most_engaged"),
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(SortOrder::Newest),
            "most_engaged" => Ok(SortOrder::MostEngaged),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

// --- Core entities ---

/// A unit of tracked source content whose replies must be collected.
/// Created upstream by ingestion; the collector only flips its status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub platform: Platform,
    pub country: String,
    pub campaign: String,
    /// Platform-native content id, when ingestion captured one.
    pub content_id: Option<String>,
    pub author_handle: Option<String>,
    pub keyword_query: Option<String>,
    /// Operator-set reply target; wins over everything else in the cascade.
    pub target_override: Option<i64>,
    /// Reply count observed on the post itself at ingestion time.
    pub observed_reply_count: Option<i64>,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Reply target cascade: explicit override > observed count > default.
    pub fn reply_target(&self, default_target: i64) -> i64 {
        self.target_override
            .or(self.observed_reply_count)
            .unwrap_or(default_target)
    }

    pub fn payload_key(&self) -> PayloadKey {
        PayloadKey {
            campaign: self.campaign.clone(),
            platform: self.platform,
            country: self.country.clone(),
            post_id: self.id,
        }
    }
}

/// One asynchronous remote collection task tied to a post.
///
/// The same row is reused across retries: `job_id` and `post_id` never
/// change, only status, counters, and `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionJob {
    /// Opaque token issued by the remote API at submit time.
    pub job_id: String,
    pub post_id: Uuid,
    pub reply_target: i64,
    pub sort_order: SortOrder,
    pub status: JobStatus,
    pub retry_count: i32,
    pub timeout_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Content address of a raw payload: `{campaign}/{platform}/{country}/{post_id}.json`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PayloadKey {
    pub campaign: String,
    pub platform: Platform,
    pub country: String,
    pub post_id: Uuid,
}

impl PayloadKey {
    pub fn object_path(&self) -> String {
        format!(
            "{}/{}/{}/{}.json",
            self.campaign, self.platform, self.country, self.post_id
        )
    }
}

impl std::fmt::Display for PayloadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.object_path())
    }
}

// --- Payloads and records ---

/// A single reply as returned by the remote API, stored verbatim in the raw
/// payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedReply {
    pub id: String,
    pub author: Option<String>,
    pub text: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub like_count: Option<i64>,
}

/// Audit trail embedded into a re-collected payload. The full prior payload
/// travels inline as `older_version` so reprocessing history never leaves
/// the data itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryMetadata {
    pub is_retry: bool,
    pub retry_count: i32,
    pub retry_timestamp: DateTime<Utc>,
    pub previous_payload_existed: bool,
    pub older_version: serde_json::Value,
}

/// The raw artifact persisted per post per collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPayload {
    /// Identity of the source post on its platform (id or permalink).
    pub source_reference: String,
    pub platform: Platform,
    pub country: String,
    pub campaign: String,
    pub collected_at: DateTime<Utc>,
    pub replies: Vec<CollectedReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryMetadata>,
}

/// Flattened analytics row. Composite identity = (source_reference,
/// record_id); unique within a partition, immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRecord {
    pub source_reference: String,
    pub record_id: String,
    pub platform: Platform,
    pub ingestion_date: NaiveDate,
    pub fetched_at: DateTime<Utc>,
    pub author: Option<String>,
    pub text: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub like_count: Option<i64>,
}

impl ReplyRecord {
    pub fn identity(&self) -> (&str, &str) {
        (&self.source_reference, &self.record_id)
    }
}

// --- Query filters ---

/// Equality filters shared by requeue and count operations.
#[derive(Debug, Clone, Default)]
pub struct JobFilters {
    pub platform: Option<Platform>,
    pub campaign: Option<String>,
    pub country: Option<String>,
    pub post_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_target_cascade() {
        let mut post = Post {
            id: Uuid::new_v4(),
            platform: Platform::Instagram,
            country: "de".into(),
            campaign: "spring".into(),
            content_id: None,
            author_handle: None,
            keyword_query: None,
            target_override: Some(75),
            observed_reply_count: Some(40),
            status: PostStatus::Awaiting,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(post.reply_target(25), 75);

        post.target_override = None;
        assert_eq!(post.reply_target(25), 40);

        post.observed_reply_count = None;
        assert_eq!(post.reply_target(25), 25);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            JobStatus::Queued,
            JobStatus::Polling,
            JobStatus::Complete,
            JobStatus::Failed,
            JobStatus::QuotaBlocked,
            JobStatus::Empty,
            JobStatus::Reviewed,
        ] {
            let parsed: JobStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn platform_serde_matches_string_form() {
        for platform in [
            Platform::Instagram,
            Platform::Facebook,
            Platform::X,
            Platform::TikTok,
        ] {
            let json = serde_json::to_value(platform).unwrap();
            assert_eq!(json, serde_json::Value::String(platform.to_string()));
        }
    }

    #[test]
    fn payload_key_path() {
        let key = PayloadKey {
            campaign: "spring".into(),
            platform: Platform::TikTok,
            country: "fr".into(),
            post_id: Uuid::nil(),
        };
        assert_eq!(
            key.object_path(),
            "spring/tiktok/fr/00000000-0000-0000-0000-000000000000.json"
        );
    }
}
