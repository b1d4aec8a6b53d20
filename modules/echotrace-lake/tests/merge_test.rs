//! Merge engine tests over tempdir-backed local object stores.

use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

use echotrace_common::{PayloadKey, Platform, ReplyRecord};
use echotrace_lake::{MergeFilters, PartitionKey, PartitionMerger, PartitionStore};
use echotrace_store::PayloadStore;

struct Lake {
    _payload_dir: TempDir,
    _partition_dir: TempDir,
    payloads: PayloadStore,
    partitions: PartitionStore,
}

fn lake() -> Lake {
    let payload_dir = TempDir::new().unwrap();
    let partition_dir = TempDir::new().unwrap();
    let payloads = PayloadStore::local(payload_dir.path().to_str().unwrap()).unwrap();
    let partitions = PartitionStore::local(partition_dir.path().to_str().unwrap()).unwrap();
    Lake {
        _payload_dir: payload_dir,
        _partition_dir: partition_dir,
        payloads,
        partitions,
    }
}

fn merger(lake: &Lake) -> PartitionMerger {
    PartitionMerger::new(lake.payloads.clone(), lake.partitions.clone())
}

fn doc(source_reference: &str, platform: Platform, reply_ids: &[&str]) -> serde_json::Value {
    let replies: Vec<_> = reply_ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "author": "alice",
                "text": format!("reply {id}"),
                "published_at": null,
                "like_count": 1
            })
        })
        .collect();
    json!({
        "source_reference": source_reference,
        "platform": platform.to_string(),
        "country": "de",
        "campaign": "spring",
        "collected_at": Utc::now().to_rfc3339(),
        "replies": replies
    })
}

async fn seed(lake: &Lake, campaign: &str, platform: Platform, document: &serde_json::Value) {
    let key = PayloadKey {
        campaign: campaign.to_string(),
        platform,
        country: "de".to_string(),
        post_id: Uuid::new_v4(),
    };
    lake.payloads.put(&key, document).await.unwrap();
}

fn record(source_reference: &str, record_id: &str, platform: Platform) -> ReplyRecord {
    let fetched = Utc::now();
    ReplyRecord {
        source_reference: source_reference.to_string(),
        record_id: record_id.to_string(),
        platform,
        ingestion_date: fetched.date_naive(),
        fetched_at: fetched,
        author: None,
        text: None,
        published_at: None,
        like_count: None,
    }
}

#[tokio::test]
async fn merge_flattens_documents_into_partitions() {
    let lake = lake();
    seed(
        &lake,
        "spring",
        Platform::Instagram,
        &doc("ig:1", Platform::Instagram, &["r1", "r2"]),
    )
    .await;

    let report = merger(&lake)
        .merge(&MergeFilters::default(), false)
        .await
        .unwrap();

    assert_eq!(report.documents_seen, 1);
    assert_eq!(report.documents_parsed, 1);
    assert_eq!(report.partitions_written, 1);
    assert_eq!(report.records_appended, 2);
    assert!(report.errors.is_empty());

    let key = PartitionKey {
        date: Utc::now().date_naive(),
        platform: Platform::Instagram,
    };
    let stored = lake.partitions.read(&key).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored
        .iter()
        .all(|r| r.source_reference == "ig:1" && r.platform == Platform::Instagram));
}

#[tokio::test]
async fn merging_the_same_document_twice_yields_one_record_per_identity() {
    let lake = lake();
    seed(
        &lake,
        "spring",
        Platform::Instagram,
        &doc("ig:1", Platform::Instagram, &["r1", "r2"]),
    )
    .await;
    let m = merger(&lake);

    let first = m.merge(&MergeFilters::default(), false).await.unwrap();
    assert_eq!(first.records_appended, 2);

    let second = m.merge(&MergeFilters::default(), false).await.unwrap();
    assert_eq!(second.records_appended, 0);
    assert_eq!(second.partitions_written, 0);
    assert_eq!(second.duplicates_dropped, 2);

    // Identity dedup alone must also hold with the heuristic disabled.
    let third = m.merge(&MergeFilters::default(), true).await.unwrap();
    assert_eq!(third.records_appended, 0);
    assert_eq!(third.duplicates_dropped, 2);

    let key = PartitionKey {
        date: Utc::now().date_naive(),
        platform: Platform::Instagram,
    };
    assert_eq!(lake.partitions.read(&key).await.unwrap().len(), 2);
}

#[tokio::test]
async fn duplicate_identities_across_documents_collapse() {
    let lake = lake();
    // Two different stored documents carrying the same (source, reply).
    seed(
        &lake,
        "spring",
        Platform::Instagram,
        &doc("ig:1", Platform::Instagram, &["r1"]),
    )
    .await;
    seed(
        &lake,
        "spring",
        Platform::Instagram,
        &doc("ig:1", Platform::Instagram, &["r1"]),
    )
    .await;

    let report = merger(&lake)
        .merge(&MergeFilters::default(), false)
        .await
        .unwrap();

    assert_eq!(report.records_appended, 1);
    assert_eq!(report.duplicates_dropped, 1);
}

#[tokio::test]
async fn stale_documents_skip_by_timestamp_unless_disabled() {
    let lake = lake();
    let key = PartitionKey {
        date: Utc::now().date_naive(),
        platform: Platform::Instagram,
    };
    // Existing partition whose newest record sits two hours ahead of the
    // document about to arrive, putting the document past the one-hour
    // safety buffer.
    let mut newest = record("prior", "r-prior", Platform::Instagram);
    newest.fetched_at = Utc::now() + Duration::hours(2);
    lake.partitions.write(&key, &[newest]).await.unwrap();

    seed(
        &lake,
        "spring",
        Platform::Instagram,
        &doc("ig:1", Platform::Instagram, &["r1", "r2"]),
    )
    .await;
    let m = merger(&lake);

    let filtered = m.merge(&MergeFilters::default(), false).await.unwrap();
    assert_eq!(filtered.skipped_by_timestamp, 1);
    assert_eq!(filtered.documents_parsed, 0);
    assert_eq!(lake.partitions.read(&key).await.unwrap().len(), 1);

    let unfiltered = m.merge(&MergeFilters::default(), true).await.unwrap();
    assert_eq!(unfiltered.skipped_by_timestamp, 0);
    assert_eq!(unfiltered.records_appended, 2);
    assert_eq!(lake.partitions.read(&key).await.unwrap().len(), 3);
}

#[tokio::test]
async fn parse_error_skips_only_the_bad_document() {
    let lake = lake();
    // Garbage bytes planted directly where a payload should live.
    let bad_dir = lake._payload_dir.path().join("spring/instagram/de");
    std::fs::create_dir_all(&bad_dir).unwrap();
    std::fs::write(bad_dir.join("broken.json"), b"{not json").unwrap();

    seed(
        &lake,
        "spring",
        Platform::Instagram,
        &doc("ig:1", Platform::Instagram, &["r1"]),
    )
    .await;

    let report = merger(&lake)
        .merge(&MergeFilters::default(), false)
        .await
        .unwrap();

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.documents_parsed, 1);
    assert_eq!(report.records_appended, 1);
}

#[tokio::test]
async fn platform_filter_narrows_the_run() {
    let lake = lake();
    seed(
        &lake,
        "spring",
        Platform::Instagram,
        &doc("ig:1", Platform::Instagram, &["r1"]),
    )
    .await;
    seed(
        &lake,
        "spring",
        Platform::TikTok,
        &doc("tt:1", Platform::TikTok, &["r1"]),
    )
    .await;

    let filters = MergeFilters {
        platform: Some(Platform::TikTok),
        ..Default::default()
    };
    let report = merger(&lake).merge(&filters, false).await.unwrap();

    assert_eq!(report.documents_seen, 1);
    let tik = PartitionKey {
        date: Utc::now().date_naive(),
        platform: Platform::TikTok,
    };
    let ig = PartitionKey {
        date: Utc::now().date_naive(),
        platform: Platform::Instagram,
    };
    assert_eq!(lake.partitions.read(&tik).await.unwrap().len(), 1);
    assert!(lake.partitions.read(&ig).await.unwrap().is_empty());
}

#[tokio::test]
async fn campaign_filter_scopes_the_listing() {
    let lake = lake();
    seed(
        &lake,
        "spring",
        Platform::Instagram,
        &doc("ig:1", Platform::Instagram, &["r1"]),
    )
    .await;
    seed(
        &lake,
        "autumn",
        Platform::Instagram,
        &doc("ig:2", Platform::Instagram, &["r9"]),
    )
    .await;

    let filters = MergeFilters {
        campaign: Some("autumn".to_string()),
        ..Default::default()
    };
    let report = merger(&lake).merge(&filters, false).await.unwrap();

    assert_eq!(report.documents_seen, 1);
    assert_eq!(report.records_appended, 1);

    let key = PartitionKey {
        date: Utc::now().date_naive(),
        platform: Platform::Instagram,
    };
    let stored = lake.partitions.read(&key).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].source_reference, "ig:2");
}
