use crate::domain::model::ImageUpload;
use crate::domain::ports::ImageStore;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Stores uploads in a local directory that the server exposes under
/// `public_base_url`.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    directory: PathBuf,
    public_base_url: String,
}

impl LocalImageStore {
    pub fn new(directory: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn public_url(&self, name: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), name)
    }

    /// File name behind one of our public URLs; `None` for anything else.
    fn owned_name<'a>(&self, url: &'a str) -> Option<&'a str> {
        let name = url
            .strip_prefix(self.public_base_url.trim_end_matches('/'))?
            .strip_prefix('/')?;
        let valid = !name.is_empty()
            && !name.contains(['/', '\\'])
            && name != "."
            && name != "..";
        valid.then_some(name)
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn put(&self, upload: &ImageUpload) -> Result<String> {
        let name = format!("{}.{}", Uuid::new_v4(), upload.extension());
        let full_path = self.directory.join(&name);

        tokio::fs::create_dir_all(&self.directory).await?;
        tokio::fs::write(&full_path, &upload.bytes).await?;

        tracing::debug!(
            "Stored image {} ({} bytes) at {}",
            name,
            upload.bytes.len(),
            full_path.display()
        );
        Ok(self.public_url(&name))
    }

    async fn remove(&self, url: &str) -> Result<bool> {
        let Some(name) = self.owned_name(url) else {
            return Ok(false);
        };

        match tokio::fs::remove_file(self.directory.join(name)).await {
            Ok(()) => {
                tracing::debug!("Removed image {}", name);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
