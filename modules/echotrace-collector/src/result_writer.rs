//! Persistence of fetched payloads, including the inline retry audit trail.

use anyhow::bail;
use chrono::Utc;

use echotrace_common::{payload_is_empty, PayloadKey, RawPayload, RetryMetadata};

use crate::traits::PayloadRepo;

/// Persist a freshly collected payload. If a prior document existed (even a
/// hollow one) or the job has been retried, the retry history, including the
/// full prior payload, is embedded into the new document before the write.
/// Genuinely empty payloads are rejected: an empty result is a job outcome,
/// never a stored artifact.
pub(crate) async fn persist_payload(
    payloads: &dyn PayloadRepo,
    key: &PayloadKey,
    mut payload: RawPayload,
    prior: Option<serde_json::Value>,
    retry_count: i32,
) -> anyhow::Result<String> {
    if prior.is_some() || retry_count > 0 {
        payload.retry = Some(RetryMetadata {
            is_retry: true,
            retry_count,
            retry_timestamp: Utc::now(),
            previous_payload_existed: prior.is_some(),
            older_version: prior.unwrap_or(serde_json::Value::Null),
        });
    }

    let value = serde_json::to_value(&payload)?;
    if payload_is_empty(&value) {
        bail!("refusing to store empty payload for {key}");
    }

    payloads.put(key, &value).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryPayloadRepo;
    use chrono::Utc;
    use echotrace_common::{CollectedReply, Platform};
    use serde_json::json;
    use uuid::Uuid;

    fn key() -> PayloadKey {
        PayloadKey {
            campaign: "spring".into(),
            platform: Platform::Instagram,
            country: "de".into(),
            post_id: Uuid::new_v4(),
        }
    }

    fn payload(replies: Vec<CollectedReply>) -> RawPayload {
        RawPayload {
            source_reference: "ig:123".into(),
            platform: Platform::Instagram,
            country: "de".into(),
            campaign: "spring".into(),
            collected_at: Utc::now(),
            replies,
            retry: None,
        }
    }

    fn reply(id: &str) -> CollectedReply {
        CollectedReply {
            id: id.into(),
            author: Some("alice".into()),
            text: Some("hello".into()),
            published_at: None,
            like_count: Some(1),
        }
    }

    #[tokio::test]
    async fn rejects_empty_payload() {
        let repo = MemoryPayloadRepo::new();
        let result = persist_payload(&repo, &key(), payload(vec![]), None, 0).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn first_write_carries_no_retry_metadata() {
        let repo = MemoryPayloadRepo::new();
        let key = key();
        persist_payload(&repo, &key, payload(vec![reply("r1")]), None, 0)
            .await
            .unwrap();

        let stored = repo.stored(&key).unwrap();
        assert!(stored.get("retry").is_none());
    }

    #[tokio::test]
    async fn embeds_prior_payload_on_retry() {
        let repo = MemoryPayloadRepo::new();
        let key = key();
        let prior = json!({"source_reference": "ig:123", "replies": []});

        persist_payload(
            &repo,
            &key,
            payload(vec![reply("r1")]),
            Some(prior.clone()),
            1,
        )
        .await
        .unwrap();

        let stored = repo.stored(&key).unwrap();
        let retry = &stored["retry"];
        assert_eq!(retry["is_retry"], json!(true));
        assert_eq!(retry["retry_count"], json!(1));
        assert_eq!(retry["previous_payload_existed"], json!(true));
        assert_eq!(retry["older_version"], prior);
    }
}
