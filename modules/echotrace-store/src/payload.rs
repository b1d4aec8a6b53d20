//! Raw payload store: one JSON document per post, content-addressed by
//! `{campaign}/{platform}/{country}/{post_id}.json` on any object_store
//! backend.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use chrono::{DateTime, Utc};
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use tracing::debug;

use echotrace_common::PayloadKey;

use crate::error::Result;

/// Metadata for one stored payload, from a listing that never downloads
/// content.
#[derive(Debug, Clone)]
pub struct PayloadMeta {
    pub path: String,
    /// When the object was last written, i.e. the payload's retrieval
    /// timestamp.
    pub last_modified: DateTime<Utc>,
}

#[derive(Clone)]
pub struct PayloadStore {
    store: Arc<dyn ObjectStore>,
}

impl PayloadStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Store rooted at a local directory (dev and tests).
    pub fn local(root: &str) -> Result<Self> {
        let store = LocalFileSystem::new_with_prefix(root)?;
        Ok(Self::new(Arc::new(store)))
    }

    /// Fetch and parse a payload. `Ok(None)` if nothing is stored.
    pub async fn get(&self, key: &PayloadKey) -> Result<Option<serde_json::Value>> {
        self.get_path(&key.object_path()).await
    }

    pub async fn get_path(&self, path: &str) -> Result<Option<serde_json::Value>> {
        let location = Path::from(path);
        match self.store.get(&location).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Existence check against object metadata only; the content is not
    /// downloaded.
    pub async fn exists(&self, key: &PayloadKey) -> Result<bool> {
        let location = Path::from(key.object_path());
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a payload atomically (temp object + rename) so a reader never
    /// sees a partial document. Returns the stored location.
    pub async fn put(&self, key: &PayloadKey, payload: &serde_json::Value) -> Result<String> {
        let location = Path::from(key.object_path());
        let temp = Path::from(format!("{}.tmp", key.object_path()));
        let bytes = serde_json::to_vec(payload)?;

        self.store
            .put(&temp, PutPayload::from(Bytes::from(bytes)))
            .await?;
        self.store.rename(&temp, &location).await?;

        debug!(path = %location, "Stored raw payload");
        Ok(location.to_string())
    }

    /// Metadata-only listing under a prefix (or the whole store).
    pub async fn list_meta(&self, prefix: Option<&str>) -> Result<Vec<PayloadMeta>> {
        let prefix_path = prefix.map(Path::from);
        let mut stream = self.store.list(prefix_path.as_ref());

        let mut metas = Vec::new();
        while let Some(entry) = stream.next().await {
            let meta = entry?;
            let path = meta.location.to_string();
            // Ignore leftovers from interrupted atomic writes.
            if path.ends_with(".tmp") {
                continue;
            }
            if path.ends_with(".json") {
                metas.push(PayloadMeta {
                    path,
                    last_modified: meta.last_modified,
                });
            }
        }

        metas.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(metas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echotrace_common::Platform;
    use serde_json::json;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn key(campaign: &str) -> PayloadKey {
        PayloadKey {
            campaign: campaign.to_string(),
            platform: Platform::Instagram,
            country: "de".to_string(),
            post_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn put_get_roundtrip_and_existence() {
        let dir = TempDir::new().unwrap();
        let store = PayloadStore::local(dir.path().to_str().unwrap()).unwrap();
        let key = key("spring");

        assert!(!store.exists(&key).await.unwrap());
        assert!(store.get(&key).await.unwrap().is_none());

        let payload = json!({"source_reference": "ig:1", "replies": [{"id": "r1"}]});
        store.put(&key, &payload).await.unwrap();

        assert!(store.exists(&key).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap().unwrap(), payload);
    }

    #[tokio::test]
    async fn listing_is_metadata_only_and_prefix_scoped() {
        let dir = TempDir::new().unwrap();
        let store = PayloadStore::local(dir.path().to_str().unwrap()).unwrap();

        store.put(&key("spring"), &json!({"a": 1})).await.unwrap();
        store.put(&key("spring"), &json!({"b": 2})).await.unwrap();
        store.put(&key("autumn"), &json!({"c": 3})).await.unwrap();

        let all = store.list_meta(None).await.unwrap();
        assert_eq!(all.len(), 3);

        let spring = store.list_meta(Some("spring")).await.unwrap();
        assert_eq!(spring.len(), 2);
        assert!(spring.iter().all(|m| m.path.starts_with("spring/")));
    }

    #[tokio::test]
    async fn overwrite_replaces_document() {
        let dir = TempDir::new().unwrap();
        let store = PayloadStore::local(dir.path().to_str().unwrap()).unwrap();
        let key = key("spring");

        store.put(&key, &json!({"v": 1})).await.unwrap();
        store.put(&key, &json!({"v": 2})).await.unwrap();

        assert_eq!(store.get(&key).await.unwrap().unwrap(), json!({"v": 2}));
    }
}
