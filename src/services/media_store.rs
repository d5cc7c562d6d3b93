//! Media blob storage: store a blob, hand back a retrievable URL.
//!
//! The store is an external collaborator; nothing here is consulted on the
//! read path. Keys are retained alongside the URL so a failed message insert
//! can roll its blob back.

use crate::config::S3Config;
use crate::error::AppError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub key: String,
    pub url: String,
}

pub struct MediaStore {
    client: Client,
    config: S3Config,
}

impl MediaStore {
    pub async fn new(config: &S3Config) -> Self {
        use aws_sdk_s3::config::Region;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        Self {
            client: Client::new(&sdk_config),
            config: config.clone(),
        }
    }

    pub async fn put(
        &self,
        data: Vec<u8>,
        content_type: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<StoredMedia, AppError> {
        let ext = file_name
            .and_then(|n| n.rsplit_once('.'))
            .map(|(_, e)| format!(".{}", e.to_lowercase()))
            .unwrap_or_default();
        let key = format!("chat-media/{}{}", Uuid::new_v4(), ext);

        let mut request = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .body(ByteStream::from(data));
        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("put {key}: {e}")))?;

        let url = self.config.object_url(&key);
        Ok(StoredMedia { key, url })
    }

    /// Best-effort delete, used to roll back an accepted attachment when the
    /// message row fails to persist.
    pub async fn delete(&self, key: &str) {
        if let Err(e) = self
            .client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
        {
            tracing::warn!(key = %key, error = %e, "failed to delete orphaned media blob");
        }
    }
}
