use crate::error::MediaResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An asset stored with the media provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAsset {
    /// Provider-side identifier, needed for later deletion
    pub public_id: String,
    /// Publicly reachable URL
    pub url: String,
}

/// Storage backend for user-uploaded media
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Upload raw bytes and return the stored asset
    async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> MediaResult<UploadedAsset>;

    /// Delete an asset by its public id
    async fn delete(&self, public_id: &str) -> MediaResult<()>;
}
