use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wrapper for API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// The three mutually exclusive query shapes the collection API accepts.
/// Only `Keyword` honors the request's sort order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum QueryInput {
    #[serde(rename_all = "camelCase")]
    ContentId { content_id: String },
    #[serde(rename_all = "camelCase")]
    Account { handle: String },
    #[serde(rename_all = "camelCase")]
    Keyword { terms: String },
}

/// Inclusive date window for keyword collection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Input for the collection submit endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRequest {
    pub query: QueryInput,
    pub platform: String,
    pub max_results: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

/// Returned by submit: the opaque token identifying the remote job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedJob {
    pub job_token: String,
    pub status: String,
}

/// Remote job metadata from the status endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_token: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Parsed form of the provider's status strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Queued,
    Running,
    Finished,
    Failed,
    Unknown(String),
}

impl JobSnapshot {
    pub fn remote_status(&self) -> RemoteStatus {
        match self.status.as_str() {
            "QUEUED" => RemoteStatus::Queued,
            "RUNNING" => RemoteStatus::Running,
            "FINISHED" => RemoteStatus::Finished,
            "FAILED" => RemoteStatus::Failed,
            other => RemoteStatus::Unknown(other.to_string()),
        }
    }
}

/// Author info nested inside a reply item.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyAuthor {
    pub user_name: Option<String>,
    pub name: Option<String>,
}

/// A single reply from a finished collection's result set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyItem {
    pub id: Option<String>,
    pub text: Option<String>,
    pub author: Option<ReplyAuthor>,
    pub published_at: Option<DateTime<Utc>>,
    pub like_count: Option<i64>,
}

/// Rolling-period usage from the usage endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub used: u64,
    pub limit: u64,
}
