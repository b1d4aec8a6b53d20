//! Flattening raw payload documents into normalized reply records.

use chrono::{DateTime, Utc};

use echotrace_common::{Platform, RawPayload, ReplyRecord};

use crate::error::{LakeError, Result};
use crate::partition::PartitionKey;

/// Platform segment of a payload path
/// (`{campaign}/{platform}/{country}/{post_id}.json`).
pub fn platform_from_path(path: &str) -> Option<Platform> {
    path.split('/').nth(1)?.parse().ok()
}

/// Flatten one raw document into records tagged with its partition key.
/// The record timestamp is the document's retrieval time, not anything the
/// payload claims about itself.
pub fn flatten_document(
    value: &serde_json::Value,
    retrieved_at: DateTime<Utc>,
    key: PartitionKey,
) -> Result<Vec<ReplyRecord>> {
    let payload: RawPayload = serde_json::from_value(value.clone())
        .map_err(|e| LakeError::Malformed(format!("payload does not parse: {e}")))?;

    Ok(payload
        .replies
        .into_iter()
        .map(|reply| ReplyRecord {
            source_reference: payload.source_reference.clone(),
            record_id: reply.id,
            platform: key.platform,
            ingestion_date: key.date,
            fetched_at: retrieved_at,
            author: reply.author,
            text: reply.text,
            published_at: reply.published_at,
            like_count: reply.like_count,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn platform_parses_from_path() {
        assert_eq!(
            platform_from_path("spring/instagram/de/abc.json"),
            Some(Platform::Instagram)
        );
        assert_eq!(platform_from_path("spring/geocities/de/abc.json"), None);
        assert_eq!(platform_from_path("loose-file.json"), None);
    }

    #[test]
    fn flatten_tags_records_with_partition_key() {
        let now = Utc::now();
        let key = PartitionKey {
            date: now.date_naive(),
            platform: Platform::X,
        };
        let doc = json!({
            "source_reference": "x:99",
            "platform": "x",
            "country": "fr",
            "campaign": "spring",
            "collected_at": now.to_rfc3339(),
            "replies": [
                {"id": "r1", "author": "bob", "text": "yes", "published_at": null, "like_count": 2},
                {"id": "r2", "author": null, "text": null, "published_at": null, "like_count": null}
            ]
        });

        let records = flatten_document(&doc, now, key).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source_reference, "x:99");
        assert_eq!(records[0].record_id, "r1");
        assert_eq!(records[0].platform, Platform::X);
        assert_eq!(records[0].fetched_at, now);
        assert_eq!(records[1].author, None);
    }

    #[test]
    fn malformed_document_is_an_error() {
        let doc = json!({"not": "a payload"});
        let result = flatten_document(
            &doc,
            Utc::now(),
            PartitionKey {
                date: Utc::now().date_naive(),
                platform: Platform::X,
            },
        );
        assert!(result.is_err());
    }
}
