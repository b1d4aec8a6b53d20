//! Poll batch: drive queued jobs through the collection state machine.
//!
//! Transitions per job:
//!   queued -> polling -> complete        finished, non-empty, persisted
//!   queued -> polling -> empty           finished, result set empty
//!   queued -> polling -> failed          remote failure, quota available
//!   queued -> polling -> quota_blocked   remote failure or missing result
//!                                        set while quota is exhausted
//!   queued -> polling -> queued          still running / unknown status
//!                                        after the bounded wait loop
//!
//! When the batch-start quota check reports exhaustion, every job stays
//! queued and no remote call is made.

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info, warn};

use echotrace_common::{
    payload_is_empty, CollectedReply, CollectionJob, JobStatus, PollReport, Post, PostStatus,
    RawPayload,
};
use listening_client::{RemoteStatus, ReplyItem};

use crate::result_writer::persist_payload;
use crate::Collector;

enum PollOutcome {
    Completed,
    Empty,
    Failed,
    QuotaBlocked,
    Requeued,
}

impl Collector {
    pub async fn poll_batch(&self, limit: usize) -> anyhow::Result<PollReport> {
        let mut report = PollReport::default();

        let queued = self.jobs.list_queued(limit as i64).await?;
        if queued.is_empty() {
            return Ok(report);
        }

        // One quota check gates the whole batch. Exhausted means every job
        // stays queued and zero remote calls are made.
        let quota = self.quota().check().await;
        if quota.exceeded {
            info!(
                used = quota.used,
                limit = quota.limit,
                jobs = queued.len(),
                "Quota exhausted, leaving poll batch queued"
            );
            report.still_queued = queued.into_iter().map(|j| j.job_id).collect();
            return Ok(report);
        }

        for mut job in queued {
            report.processed += 1;

            let outcome = match self.poll_one(&mut job).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // A fault on one job never aborts the batch. It is
                    // classified through the same quota-aware branch a
                    // remote failure takes.
                    warn!(job_id = %job.job_id, error = ?e, "Poll errored, classifying as failure");
                    report.errors.push(format!("{}: {e:#}", job.job_id));
                    match self.classify_failure(&mut job).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            report
                                .errors
                                .push(format!("{}: classification failed: {e:#}", job.job_id));
                            continue;
                        }
                    }
                }
            };

            match outcome {
                PollOutcome::Completed => report.completed += 1,
                PollOutcome::Empty => report.empty += 1,
                PollOutcome::Failed => report.failed += 1,
                PollOutcome::QuotaBlocked => report.quota_blocked += 1,
                PollOutcome::Requeued => report.requeued += 1,
            }
        }

        Ok(report)
    }

    async fn poll_one(&self, job: &mut CollectionJob) -> anyhow::Result<PollOutcome> {
        self.set_job_status(job, JobStatus::Polling).await?;

        let post = self.posts.get(job.post_id).await?.with_context(|| {
            format!("job {} references missing post {}", job.job_id, job.post_id)
        })?;
        let key = post.payload_key();

        // A prior run may already have produced valid output for this post.
        // In that case the remote side is never consulted.
        let prior = self.payloads.get(&key).await?;
        if let Some(existing) = &prior {
            if !payload_is_empty(existing) {
                self.set_job_status(job, JobStatus::Complete).await?;
                self.posts.set_status(post.id, PostStatus::Complete).await?;
                debug!(job_id = %job.job_id, "Existing payload, completed without remote calls");
                return Ok(PollOutcome::Completed);
            }
        }

        match self.wait_for_remote(job).await? {
            RemoteStatus::Finished => self.handle_finished(job, &post, prior).await,
            RemoteStatus::Failed => self.classify_failure(job).await,
            RemoteStatus::Queued | RemoteStatus::Running => self.requeue_timeout(job).await,
            RemoteStatus::Unknown(status) => {
                warn!(job_id = %job.job_id, status, "Unrecognized remote status");
                self.requeue_timeout(job).await
            }
        }
    }

    /// Bounded wait: fixed rounds at a fixed interval, so a job that keeps
    /// reporting `running` cannot block the batch indefinitely.
    async fn wait_for_remote(&self, job: &CollectionJob) -> anyhow::Result<RemoteStatus> {
        let mut status = self.api.job_status(&job.job_id).await?.remote_status();
        let mut rounds = 1;
        while rounds < self.config.poll_rounds
            && !matches!(status, RemoteStatus::Finished | RemoteStatus::Failed)
        {
            tokio::time::sleep(self.config.poll_interval).await;
            status = self.api.job_status(&job.job_id).await?.remote_status();
            rounds += 1;
        }
        Ok(status)
    }

    async fn handle_finished(
        &self,
        job: &mut CollectionJob,
        post: &Post,
        prior: Option<serde_json::Value>,
    ) -> anyhow::Result<PollOutcome> {
        let Some(items) = self.api.results(&job.job_id, post.platform).await? else {
            // Finished but no result set to fetch. Quota decides whether
            // this was a real failure or starvation.
            return self.classify_failure(job).await;
        };

        let replies = flatten_items(items);
        if replies.is_empty() {
            // The remote job did complete; it simply found nothing. Terminal
            // until a manual requeue, since auto-resubmitting would burn
            // quota on posts with no real replies. The parent keeps its
            // status.
            self.set_job_status(job, JobStatus::Empty).await?;
            info!(job_id = %job.job_id, post_id = %post.id, "Collection came back empty");
            return Ok(PollOutcome::Empty);
        }

        let count = replies.len();
        let payload = RawPayload {
            source_reference: source_reference(post),
            platform: post.platform,
            country: post.country.clone(),
            campaign: post.campaign.clone(),
            collected_at: Utc::now(),
            replies,
            retry: None,
        };
        persist_payload(
            self.payloads.as_ref(),
            &post.payload_key(),
            payload,
            prior,
            job.retry_count,
        )
        .await?;

        self.set_job_status(job, JobStatus::Complete).await?;
        self.posts.set_status(post.id, PostStatus::Complete).await?;
        info!(job_id = %job.job_id, post_id = %post.id, count, "Collection complete");
        Ok(PollOutcome::Completed)
    }

    /// Terminal-failure classification, quota first: an exhausted quota
    /// parks the job in quota_blocked (post untouched, eligible later);
    /// otherwise the job fails, and the post reverts to awaiting unless a
    /// sibling job is still active.
    async fn classify_failure(&self, job: &mut CollectionJob) -> anyhow::Result<PollOutcome> {
        let quota = self.quota().check().await;
        if quota.exceeded {
            self.set_job_status(job, JobStatus::QuotaBlocked).await?;
            info!(job_id = %job.job_id, "Job blocked on quota");
            return Ok(PollOutcome::QuotaBlocked);
        }

        self.set_job_status(job, JobStatus::Failed).await?;
        if !self
            .jobs
            .has_active_sibling(job.post_id, &job.job_id)
            .await?
        {
            self.posts
                .set_status(job.post_id, PostStatus::Awaiting)
                .await?;
        }
        info!(job_id = %job.job_id, "Job failed");
        Ok(PollOutcome::Failed)
    }

    /// The remote side is still working (or said something we don't
    /// recognize): back to queued for the next cycle, up to the ceiling.
    async fn requeue_timeout(&self, job: &mut CollectionJob) -> anyhow::Result<PollOutcome> {
        job.timeout_count += 1;
        if job.timeout_count > self.config.max_timeout_requeues {
            warn!(
                job_id = %job.job_id,
                timeouts = job.timeout_count,
                "Timeout ceiling reached, taking failure branch"
            );
            return self.classify_failure(job).await;
        }

        self.set_job_status(job, JobStatus::Queued).await?;
        debug!(job_id = %job.job_id, timeouts = job.timeout_count, "Job requeued");
        Ok(PollOutcome::Requeued)
    }

    pub(crate) async fn set_job_status(
        &self,
        job: &mut CollectionJob,
        status: JobStatus,
    ) -> anyhow::Result<()> {
        job.status = status;
        job.updated_at = Utc::now();
        self.jobs.update(job).await
    }
}

fn flatten_items(items: Vec<ReplyItem>) -> Vec<CollectedReply> {
    items
        .into_iter()
        .filter_map(|item| {
            let id = item.id?;
            let author = item
                .author
                .and_then(|a| a.user_name.or(a.name));
            Some(CollectedReply {
                id,
                author,
                text: item.text,
                published_at: item.published_at,
                like_count: item.like_count,
            })
        })
        .collect()
}

fn source_reference(post: &Post) -> String {
    post.content_id
        .clone()
        .unwrap_or_else(|| post.id.to_string())
}
