//! Cloudinary-backed media store
//!
//! Uploads go through the signed upload API; deletions use the Admin API
//! with basic authentication.

use crate::error::{MediaError, MediaResult};
use crate::store::{MediaStore, UploadedAsset};
use async_trait::async_trait;
use core_config::{env_or_default, env_required, ConfigError, FromEnv};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Folder assets are uploaded into
    pub folder: String,
}

impl FromEnv for CloudinaryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            cloud_name: env_required("CLOUDINARY_CLOUD_NAME")?,
            api_key: env_required("CLOUDINARY_API_KEY")?,
            api_secret: env_required("CLOUDINARY_API_SECRET")?,
            folder: env_or_default("CLOUDINARY_FOLDER", "bazaar"),
        })
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

pub struct CloudinaryStore {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(CloudinaryConfig::from_env()?))
    }

    /// Sign upload parameters. Parameters are joined in alphabetical order,
    /// the API secret is appended, and the whole string is SHA-256 hashed.
    fn sign(&self, timestamp: u64) -> String {
        let to_sign = format!(
            "folder={}&timestamp={}{}",
            self.config.folder, timestamp, self.config.api_secret
        );
        const_hex::encode(Sha256::digest(to_sign.as_bytes()))
    }

    fn upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.config.cloud_name
        )
    }

    fn admin_resources_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/resources/image/upload",
            self.config.cloud_name
        )
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> MediaResult<UploadedAsset> {
        if bytes.is_empty() {
            return Err(MediaError::InvalidInput("empty file".to_string()));
        }

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| MediaError::Config(e.to_string()))?
            .as_secs();
        let signature = self.sign(timestamp);

        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(content_type)
            .map_err(|e| MediaError::InvalidInput(e.to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("folder", self.config.folder.clone())
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        debug!(url = %self.upload_url(), "uploading asset");

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::UploadFailed(format!("{status}: {body}")));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| MediaError::InvalidResponse(e.to_string()))?;

        info!(public_id = %uploaded.public_id, "asset uploaded");

        Ok(UploadedAsset {
            public_id: uploaded.public_id,
            url: uploaded.secure_url,
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, public_id: &str) -> MediaResult<()> {
        let response = self
            .client
            .delete(self.admin_resources_url())
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .query(&[("public_ids[]", public_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::DeleteFailed(format!("{status}: {body}")));
        }

        info!(public_id, "asset deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CloudinaryStore {
        CloudinaryStore::new(CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            folder: "avatars".to_string(),
        })
    }

    #[test]
    fn signature_is_stable_for_same_inputs() {
        let store = store();
        assert_eq!(store.sign(1700000000), store.sign(1700000000));
        assert_ne!(store.sign(1700000000), store.sign(1700000001));
    }

    #[test]
    fn urls_embed_cloud_name() {
        let store = store();
        assert_eq!(
            store.upload_url(),
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
        assert_eq!(
            store.admin_resources_url(),
            "https://api.cloudinary.com/v1_1/demo/resources/image/upload"
        );
    }

    #[tokio::test]
    async fn upload_rejects_empty_bytes() {
        let store = store();
        let err = store
            .upload(Vec::new(), "a.png", "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }
}
