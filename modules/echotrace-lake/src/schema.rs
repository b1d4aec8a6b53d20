//! Arrow schema for reply records and conversions to and from record
//! batches.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Int64Array, RecordBatch, StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use chrono::{DateTime, NaiveDate, Utc};

use echotrace_common::{Platform, ReplyRecord};

use crate::error::{LakeError, Result};

pub fn replies_schema() -> SchemaRef {
    let timestamp = DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()));
    Arc::new(Schema::new(vec![
        Field::new("source_reference", DataType::Utf8, false),
        Field::new("record_id", DataType::Utf8, false),
        Field::new("platform", DataType::Utf8, false),
        Field::new("ingestion_date", DataType::Utf8, false),
        Field::new("fetched_at", timestamp.clone(), false),
        Field::new("author", DataType::Utf8, true),
        Field::new("text", DataType::Utf8, true),
        Field::new("published_at", timestamp, true),
        Field::new("like_count", DataType::Int64, true),
    ]))
}

pub fn records_to_batch(records: &[ReplyRecord]) -> Result<RecordBatch> {
    let source_reference: StringArray = records
        .iter()
        .map(|r| Some(r.source_reference.as_str()))
        .collect();
    let record_id: StringArray = records.iter().map(|r| Some(r.record_id.as_str())).collect();
    let platform: StringArray = records
        .iter()
        .map(|r| Some(r.platform.to_string()))
        .collect();
    let ingestion_date: StringArray = records
        .iter()
        .map(|r| Some(r.ingestion_date.to_string()))
        .collect();
    let fetched_at = TimestampMicrosecondArray::from(
        records
            .iter()
            .map(|r| r.fetched_at.timestamp_micros())
            .collect::<Vec<i64>>(),
    )
    .with_timezone("UTC");
    let author: StringArray = records.iter().map(|r| r.author.as_deref()).collect();
    let text: StringArray = records.iter().map(|r| r.text.as_deref()).collect();
    let published_at = TimestampMicrosecondArray::from(
        records
            .iter()
            .map(|r| r.published_at.map(|t| t.timestamp_micros()))
            .collect::<Vec<Option<i64>>>(),
    )
    .with_timezone("UTC");
    let like_count = Int64Array::from(records.iter().map(|r| r.like_count).collect::<Vec<_>>());

    let batch = RecordBatch::try_new(
        replies_schema(),
        vec![
            Arc::new(source_reference) as ArrayRef,
            Arc::new(record_id),
            Arc::new(platform),
            Arc::new(ingestion_date),
            Arc::new(fetched_at),
            Arc::new(author),
            Arc::new(text),
            Arc::new(published_at),
            Arc::new(like_count),
        ],
    )?;
    Ok(batch)
}

pub fn batch_to_records(batch: &RecordBatch) -> Result<Vec<ReplyRecord>> {
    let source_reference = string_column(batch, "source_reference")?;
    let record_id = string_column(batch, "record_id")?;
    let platform = string_column(batch, "platform")?;
    let ingestion_date = string_column(batch, "ingestion_date")?;
    let fetched_at = timestamp_column(batch, "fetched_at")?;
    let author = string_column(batch, "author")?;
    let text = string_column(batch, "text")?;
    let published_at = timestamp_column(batch, "published_at")?;
    let like_count = batch
        .column_by_name("like_count")
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| LakeError::Malformed("missing like_count column".into()))?;

    let mut records = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        records.push(ReplyRecord {
            source_reference: source_reference.value(i).to_string(),
            record_id: record_id.value(i).to_string(),
            platform: platform
                .value(i)
                .parse::<Platform>()
                .map_err(LakeError::Malformed)?,
            ingestion_date: NaiveDate::parse_from_str(ingestion_date.value(i), "%Y-%m-%d")
                .map_err(|e| LakeError::Malformed(format!("bad ingestion_date: {e}")))?,
            fetched_at: micros_to_datetime(fetched_at.value(i))?,
            author: opt_string(author, i),
            text: opt_string(text, i),
            published_at: if published_at.is_null(i) {
                None
            } else {
                Some(micros_to_datetime(published_at.value(i))?)
            },
            like_count: if like_count.is_null(i) {
                None
            } else {
                Some(like_count.value(i))
            },
        });
    }
    Ok(records)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| LakeError::Malformed(format!("missing {name} column")))
}

fn timestamp_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a TimestampMicrosecondArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<TimestampMicrosecondArray>())
        .ok_or_else(|| LakeError::Malformed(format!("missing {name} column")))
}

fn opt_string(array: &StringArray, i: usize) -> Option<String> {
    if array.is_null(i) {
        None
    } else {
        Some(array.value(i).to_string())
    }
}

fn micros_to_datetime(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| LakeError::Malformed(format!("timestamp out of range: {micros}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str) -> ReplyRecord {
        let fetched = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        ReplyRecord {
            source_reference: "ig:123".into(),
            record_id: id.into(),
            platform: Platform::Instagram,
            ingestion_date: fetched.date_naive(),
            fetched_at: fetched,
            author: Some("alice".into()),
            text: None,
            published_at: Some(fetched - chrono::Duration::hours(3)),
            like_count: Some(7),
        }
    }

    #[test]
    fn batch_roundtrip_preserves_records() {
        let records = vec![record("r1"), record("r2")];
        let batch = records_to_batch(&records).unwrap();
        assert_eq!(batch.num_rows(), 2);

        let back = batch_to_records(&batch).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn nullable_fields_survive() {
        let mut r = record("r1");
        r.author = None;
        r.published_at = None;
        r.like_count = None;

        let batch = records_to_batch(&[r.clone()]).unwrap();
        let back = batch_to_records(&batch).unwrap();
        assert_eq!(back[0], r);
    }
}
