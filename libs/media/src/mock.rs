use crate::error::{MediaError, MediaResult};
use crate::store::{MediaStore, UploadedAsset};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory store for tests. Uploads return deterministic fake URLs and
/// deletions are recorded.
#[derive(Clone, Default)]
pub struct MockMediaStore {
    uploads: Arc<Mutex<Vec<UploadedAsset>>>,
    deletes: Arc<Mutex<Vec<String>>>,
    counter: Arc<AtomicU64>,
    fail: bool,
}

impl MockMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose operations always fail
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn uploaded_assets(&self) -> Vec<UploadedAsset> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaStore for MockMediaStore {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        _content_type: &str,
    ) -> MediaResult<UploadedAsset> {
        if self.fail {
            return Err(MediaError::UploadFailed("mock store configured to fail".to_string()));
        }
        if bytes.is_empty() {
            return Err(MediaError::InvalidInput("empty file".to_string()));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let public_id = format!("mock-{n}");
        let asset = UploadedAsset {
            url: format!("https://media.test/{public_id}/{filename}"),
            public_id,
        };
        self.uploads.lock().unwrap().push(asset.clone());
        Ok(asset)
    }

    async fn delete(&self, public_id: &str) -> MediaResult<()> {
        if self.fail {
            return Err(MediaError::DeleteFailed("mock store configured to fail".to_string()));
        }
        self.deletes.lock().unwrap().push(public_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uploads_get_unique_public_ids() {
        let store = MockMediaStore::new();
        let a = store.upload(vec![1], "a.png", "image/png").await.unwrap();
        let b = store.upload(vec![2], "b.png", "image/png").await.unwrap();
        assert_ne!(a.public_id, b.public_id);
        assert_eq!(store.uploaded_assets().len(), 2);
    }

    #[tokio::test]
    async fn deletions_are_recorded() {
        let store = MockMediaStore::new();
        store.delete("mock-0").await.unwrap();
        assert_eq!(store.deleted_ids(), vec!["mock-0".to_string()]);
    }

    #[tokio::test]
    async fn failing_store_rejects_everything() {
        let store = MockMediaStore::failing();
        assert!(store.upload(vec![1], "a.png", "image/png").await.is_err());
        assert!(store.delete("x").await.is_err());
    }
}
