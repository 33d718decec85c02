use crate::error::StorageError;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[cfg(test)]
pub mod memory;

/// Binary object storage, addressed by bucket and relative path.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes`, never replacing an existing object.
    async fn put(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Objects as files below `root`, published under `public_url`.
pub struct FsObjectStore {
    root: PathBuf,
    public_url: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        FsObjectStore {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_owned(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf, StorageError> {
        let mut resolved = self.root.clone();
        for part in [bucket, path] {
            let relative = Path::new(part);
            if part.is_empty()
                || !relative
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)))
            {
                return Err(StorageError::InvalidPath(format!("{}/{}", bucket, path)));
            }
            resolved.push(relative);
        }
        Ok(resolved)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let target = self.resolve(bucket, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::Duplicate(format!("{}/{}", bucket, path)));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(bytes).await?;
        file.flush().await?;

        debug!(
            bucket = bucket,
            path = path,
            size = bytes.len(),
            "Stored object"
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.public_url, bucket, path)
    }
}
