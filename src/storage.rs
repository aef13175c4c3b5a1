use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{analysis::EncodedImage, config::StorageConfig};

/// Lifetime of presigned photo links.
pub const PHOTO_URL_TTL_SECS: u64 = 30 * 60;

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String>;
}

/// S3-compatible bucket (MinIO in development).
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub async fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for S3Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String> {
        let expires = PresigningConfig::expires_in(std::time::Duration::from_secs(seconds))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(expires)
            .await
            .context("s3 presign_get")?;
        Ok(presigned.uri().to_string())
    }
}

/// In-process bucket for tests and `AppState::fake`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.objects
            .lock()
            .await
            .insert(key.to_string(), (body, content_type.to_string()));
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.objects.lock().await.remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str, _seconds: u64) -> anyhow::Result<String> {
        anyhow::ensure!(
            self.objects.lock().await.contains_key(key),
            "no object {key}"
        );
        Ok(format!("https://fake.local/{key}"))
    }
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

pub fn entry_image_key(user: Uuid, entry_id: Uuid, mime_type: &str) -> String {
    let ext = ext_from_mime(mime_type).unwrap_or("bin");
    format!("meals/{user}/{entry_id}.{ext}")
}

/// Decodes the captured photo and stores it under the entry's key.
/// Returns the object key to keep as the entry's `imageRef`.
pub async fn upload_entry_image(
    storage: &dyn StorageClient,
    user: Uuid,
    entry_id: Uuid,
    image: &EncodedImage,
) -> anyhow::Result<String> {
    let body = STANDARD
        .decode(image.data.as_bytes())
        .context("decode base64 image")?;
    let key = entry_image_key(user, entry_id, &image.mime_type);
    storage
        .put_object(&key, Bytes::from(body), &image.mime_type)
        .await
        .with_context(|| format!("put_object {key}"))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_user_and_entry() {
        let user = Uuid::new_v4();
        let entry = Uuid::new_v4();
        assert_eq!(
            entry_image_key(user, entry, "image/png"),
            format!("meals/{user}/{entry}.png")
        );
        assert!(entry_image_key(user, entry, "application/pdf").ends_with(".bin"));
    }

    #[tokio::test]
    async fn upload_decodes_and_presigns() {
        let storage = MemoryStorage::new();
        let user = Uuid::new_v4();
        let entry = Uuid::new_v4();
        let image = EncodedImage::from_client("data:image/jpeg;base64,/9j/4AAQ");

        let key = upload_entry_image(&storage, user, entry, &image).await.unwrap();
        assert_eq!(storage.keys().await, vec![key.clone()]);
        let url = storage.presign_get(&key, PHOTO_URL_TTL_SECS).await.unwrap();
        assert!(url.ends_with(".jpg"));

        storage.delete_object(&key).await.unwrap();
        assert!(storage.presign_get(&key, 60).await.is_err());
    }

    #[tokio::test]
    async fn invalid_base64_is_rejected_before_upload() {
        let storage = MemoryStorage::new();
        let image = EncodedImage::from_client("not base64 at all!");
        let res = upload_entry_image(&storage, Uuid::new_v4(), Uuid::new_v4(), &image).await;
        assert!(res.is_err());
        assert!(storage.keys().await.is_empty());
    }
}
