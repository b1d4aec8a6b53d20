//! Submit batch: select eligible posts, create remote jobs for them.
//!
//! The first submit failure stops the whole batch. A failed submit usually
//! means quota exhaustion or a provider outage, and every further attempt
//! would burn a call against the same condition.

use chrono::Utc;
use tracing::{info, warn};

use echotrace_common::{
    payload_is_empty, CollectionJob, JobStatus, PostStatus, SubmitReport, SubmitStop,
};
use listening_client::{CollectionRequest, ListeningError, QueryInput};

use crate::selector::{order_candidates, query_input_for, SELECTION_WINDOW};
use crate::Collector;

impl Collector {
    pub async fn submit_batch(&self, limit: usize) -> anyhow::Result<SubmitReport> {
        let mut report = SubmitReport::default();

        let quota = self.quota().check().await;
        if quota.exceeded {
            info!(used = quota.used, limit = quota.limit, "Quota exhausted, skipping submit batch");
            report.stopped = Some(SubmitStop::QuotaExhausted {
                used: quota.used,
                limit: quota.limit,
            });
            return Ok(report);
        }

        let awaiting = self.posts.list_awaiting(SELECTION_WINDOW).await?;
        let candidates = order_candidates(awaiting, self.config.priority_platform);

        for post in candidates {
            if report.submitted >= limit {
                break;
            }
            report.examined += 1;

            let target = post.reply_target(self.config.default_reply_target);
            if target <= 0 {
                self.posts.set_status(post.id, PostStatus::Skipped).await?;
                report.skipped_zero_target += 1;
                continue;
            }

            // A post that already has usable replies on disk needs no remote
            // call at all.
            if let Some(existing) = self.payloads.get(&post.payload_key()).await? {
                if !payload_is_empty(&existing) {
                    self.posts.set_status(post.id, PostStatus::Complete).await?;
                    report.skipped_existing_payload += 1;
                    continue;
                }
            }

            // Best-effort: no second job while one is queued or polling.
            // Not transactional; overlapping batches can still double-submit.
            if self.jobs.has_active_job(post.id).await? {
                report.skipped_active_job += 1;
                continue;
            }

            let Some(query) = query_input_for(&post) else {
                report.skipped_malformed += 1;
                report
                    .errors
                    .push(format!("{}: no content id, handle, or keywords", post.id));
                continue;
            };

            let sort_order = matches!(query, QueryInput::Keyword { .. })
                .then(|| self.config.default_sort_order.to_string());
            let request = CollectionRequest {
                query,
                platform: post.platform.to_string(),
                max_results: target,
                sort_order,
                date_range: None,
            };

            match self.api.submit(&request).await {
                Ok(submitted) => {
                    let now = Utc::now();
                    let job = CollectionJob {
                        job_id: submitted.job_token,
                        post_id: post.id,
                        reply_target: target,
                        sort_order: self.config.default_sort_order,
                        status: JobStatus::Queued,
                        retry_count: 0,
                        timeout_count: 0,
                        created_at: now,
                        updated_at: now,
                    };
                    self.jobs.insert(&job).await?;
                    self.posts
                        .set_status(post.id, PostStatus::InProgress)
                        .await?;
                    info!(
                        post_id = %post.id,
                        job_id = %job.job_id,
                        platform = %post.platform,
                        target,
                        "Collection job submitted"
                    );
                    report.submitted += 1;
                }
                Err(e) => {
                    warn!(post_id = %post.id, error = %e, "Submit failed, stopping batch");
                    report.errors.push(format!("{}: {e}", post.id));
                    report.stopped = Some(classify_submit_failure(&e));
                    break;
                }
            }
        }

        Ok(report)
    }
}

fn classify_submit_failure(e: &ListeningError) -> SubmitStop {
    if e.is_rate_limited() {
        return SubmitStop::RateLimited;
    }
    if e.is_forbidden() {
        return SubmitStop::Forbidden;
    }
    match e {
        ListeningError::Api { status, .. } => SubmitStop::RemoteError { status: *status },
        _ => SubmitStop::Unreachable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_failure_classification() {
        let rate_limited = ListeningError::Api {
            status: 429,
            message: "slow down".into(),
        };
        assert_eq!(
            classify_submit_failure(&rate_limited),
            SubmitStop::RateLimited
        );

        let forbidden = ListeningError::Api {
            status: 403,
            message: "nope".into(),
        };
        assert_eq!(classify_submit_failure(&forbidden), SubmitStop::Forbidden);

        let server = ListeningError::Api {
            status: 500,
            message: "boom".into(),
        };
        assert_eq!(
            classify_submit_failure(&server),
            SubmitStop::RemoteError { status: 500 }
        );

        let network = ListeningError::Network("refused".into());
        assert_eq!(classify_submit_failure(&network), SubmitStop::Unreachable);
    }
}
