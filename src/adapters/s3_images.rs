#[cfg(feature = "s3")]
use crate::domain::model::ImageUpload;
#[cfg(feature = "s3")]
use crate::domain::ports::ImageStore;
#[cfg(feature = "s3")]
use crate::utils::error::{ListingError, Result};
#[cfg(feature = "s3")]
use async_trait::async_trait;
#[cfg(feature = "s3")]
use aws_sdk_s3::error::DisplayErrorContext;
#[cfg(feature = "s3")]
use aws_sdk_s3::primitives::ByteStream;
#[cfg(feature = "s3")]
use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "s3")]
use uuid::Uuid;

#[cfg(feature = "s3")]
#[derive(Debug, Clone)]
pub struct S3ImageStore {
    client: S3Client,
    bucket: String,
    prefix: String,
    public_base_url: String,
}

#[cfg(feature = "s3")]
impl S3ImageStore {
    pub fn new(client: S3Client, bucket: String, prefix: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            prefix: prefix.trim_matches('/').to_string(),
            public_base_url,
        }
    }

    /// Builds a client from the default AWS credential chain for `region`.
    pub async fn from_env(
        region: &str,
        bucket: String,
        prefix: String,
        public_base_url: String,
    ) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let config = aws_sdk_s3::config::Builder::from(&config)
            .region(aws_sdk_s3::config::Region::new(region.to_string()))
            .force_path_style(true)
            .build();

        Self::new(S3Client::from_conf(config), bucket, prefix, public_base_url)
    }

    /// Object key behind one of our public URLs, restricted to the prefix.
    fn owned_key<'a>(&self, url: &'a str) -> Option<&'a str> {
        let key = url
            .strip_prefix(self.public_base_url.trim_end_matches('/'))?
            .strip_prefix('/')?;
        if key.is_empty() || key.contains("..") {
            return None;
        }
        if !self.prefix.is_empty() && !key.starts_with(&format!("{}/", self.prefix)) {
            return None;
        }
        Some(key)
    }

    fn object_key(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }
}

#[cfg(feature = "s3")]
#[async_trait]
impl ImageStore for S3ImageStore {
    async fn put(&self, upload: &ImageUpload) -> Result<String> {
        let key = self.object_key(&format!("{}.{}", Uuid::new_v4(), upload.extension()));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(&upload.content_type)
            .body(ByteStream::from(upload.bytes.clone()))
            .send()
            .await
            .map_err(|e| ListingError::ImageStore {
                message: format!("Failed to write {} to S3: {}", key, DisplayErrorContext(&e)),
            })?;

        tracing::debug!("Uploaded image s3://{}/{}", self.bucket, key);
        Ok(format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            key
        ))
    }

    async fn remove(&self, url: &str) -> Result<bool> {
        let Some(key) = self.owned_key(url) else {
            return Ok(false);
        };

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ListingError::ImageStore {
                message: format!("Failed to delete {} from S3: {}", key, DisplayErrorContext(&e)),
            })?;

        tracing::debug!("Deleted image s3://{}/{}", self.bucket, key);
        Ok(true)
    }
}
