pub mod error;
pub mod types;

pub use error::{ListeningError, Result};
pub use types::{
    ApiResponse, CollectionRequest, DateRange, JobSnapshot, QueryInput, RemoteStatus, ReplyAuthor,
    ReplyItem, SubmittedJob, UsageSnapshot,
};

const BASE_URL: &str = "https://api.listening.dev/v1";

/// HTTP client for the asynchronous collection API: submit a job, read its
/// status, fetch its result set, read quota usage.
pub struct ListeningClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl ListeningClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, BASE_URL.to_string())
    }

    /// Point the client at a non-default API host (staging, test server).
    pub fn with_base_url(token: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url,
        }
    }

    /// Submit a collection job. Returns immediately with the job token;
    /// the job runs asynchronously on the provider side.
    pub async fn submit(&self, request: &CollectionRequest) -> Result<SubmittedJob> {
        let url = format!("{}/collections", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ListeningError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let api_resp: ApiResponse<SubmittedJob> = resp.json().await?;
        tracing::debug!(job_token = %api_resp.data.job_token, "Collection job submitted");
        Ok(api_resp.data)
    }

    /// Read the current status of a job.
    pub async fn job_status(&self, job_token: &str) -> Result<JobSnapshot> {
        let url = format!("{}/collections/{}", self.base_url, job_token);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ListeningError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let api_resp: ApiResponse<JobSnapshot> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Fetch the result set of a finished job. `Ok(None)` means the provider
    /// has no result set for this token (expired or never materialized),
    /// distinct from an empty collection, which comes back as `Some(vec![])`.
    pub async fn results(&self, job_token: &str, platform: &str) -> Result<Option<Vec<ReplyItem>>> {
        let url = format!(
            "{}/collections/{}/results?platform={}",
            self.base_url, job_token, platform
        );
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 404 {
            tracing::debug!(job_token, "No result set for job");
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ListeningError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let items: Vec<ReplyItem> = resp.json().await?;
        tracing::debug!(job_token, count = items.len(), "Fetched collection results");
        Ok(Some(items))
    }

    /// Read rolling-period usage against the call quota.
    pub async fn usage(&self) -> Result<UsageSnapshot> {
        let url = format!("{}/usage", self.base_url);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ListeningError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let api_resp: ApiResponse<UsageSnapshot> = resp.json().await?;
        Ok(api_resp.data)
    }
}
