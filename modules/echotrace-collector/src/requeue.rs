//! Operator-triggered reactivation of empty jobs.

use tracing::info;

use echotrace_common::{JobFilters, JobStatus, PostStatus, RequeueReport};

use crate::Collector;

impl Collector {
    /// Move `empty` jobs back to `queued` so the next poll cycle picks them
    /// up. Purely local: no remote call is made. The job row is reused,
    /// retry_count goes up, job_id stays. A parent post that had been marked
    /// complete reverts to awaiting.
    pub async fn requeue_empty(
        &self,
        filters: &JobFilters,
        limit: usize,
    ) -> anyhow::Result<RequeueReport> {
        let jobs = self.jobs.list_empty(filters, limit as i64).await?;
        let mut report = RequeueReport {
            found: jobs.len(),
            ..Default::default()
        };

        for mut job in jobs {
            job.retry_count += 1;
            let result: anyhow::Result<()> = async {
                self.set_job_status(&mut job, JobStatus::Queued).await?;
                if let Some(post) = self.posts.get(job.post_id).await? {
                    if post.status == PostStatus::Complete {
                        self.posts
                            .set_status(post.id, PostStatus::Awaiting)
                            .await?;
                    }
                }
                Ok(())
            }
            .await;

            match result {
                Ok(()) => {
                    info!(
                        job_id = %job.job_id,
                        retry_count = job.retry_count,
                        "Empty job requeued"
                    );
                    report.requeued += 1;
                }
                Err(e) => report.errors.push(format!("{}: {e:#}", job.job_id)),
            }
        }

        Ok(report)
    }
}
