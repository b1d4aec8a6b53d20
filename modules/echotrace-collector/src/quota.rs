//! Admission control against the provider's rolling call quota.

use tracing::warn;

use crate::traits::CollectionApi;

#[derive(Debug, Clone, Copy)]
pub struct QuotaStatus {
    pub used: u64,
    pub limit: u64,
    pub exceeded: bool,
}

/// Read-through check of the remote usage endpoint. Holds no state of its
/// own; callers re-check whenever a decision depends on quota.
pub struct QuotaGuard<'a> {
    api: &'a dyn CollectionApi,
}

impl<'a> QuotaGuard<'a> {
    pub fn new(api: &'a dyn CollectionApi) -> Self {
        Self { api }
    }

    /// Fail-open: if the usage endpoint itself errors, report not-exceeded
    /// so a monitoring outage cannot starve the pipeline.
    pub async fn check(&self) -> QuotaStatus {
        match self.api.usage().await {
            Ok(usage) => QuotaStatus {
                used: usage.used,
                limit: usage.limit,
                exceeded: usage.used >= usage.limit,
            },
            Err(e) => {
                warn!(error = %e, "Usage check failed, proceeding as if quota available");
                QuotaStatus {
                    used: 0,
                    limit: 0,
                    exceeded: false,
                }
            }
        }
    }
}
