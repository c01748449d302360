use async_trait::async_trait;
use nanoid::nanoid;
use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use crate::upload::UploadedFile;

pub const CLUB_LOGOS: &str = "club_logos";
pub const STAFF_PHOTOS: &str = "staff_photos";
pub const STUDENT_PHOTOS: &str = "student_photos";
pub const EVENT_IMAGES: &str = "event_images";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage path `{0}`")]
    InvalidPath(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The shared namespace every uploaded blob lives in. Paths are relative,
/// `/`-separated and start with the folder they were stored under.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Writes `file` under `folder` with a generated name and returns its path.
    async fn store(&self, folder: &str, file: &UploadedFile) -> Result<String, StorageError>;

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Returns whether a blob was actually removed.
    async fn delete(&self, path: &str) -> Result<bool, StorageError>;
}

/// Blobs as plain files below a root directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let is_plain = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStorage for LocalStorage {
    async fn store(&self, folder: &str, file: &UploadedFile) -> Result<String, StorageError> {
        let path = format!("{folder}/{}.{}", nanoid!(40), file.extension());
        let full = self.resolve(&path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, &file.bytes).await?;
        Ok(path)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        Ok(tokio::fs::read(self.resolve(path)?).await?)
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        match tokio::fs::metadata(self.resolve(path)?).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        match tokio::fs::remove_file(self.resolve(path)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Best-effort removal of blobs nothing references anymore. Failures are
/// logged and otherwise ignored.
pub async fn discard<I>(storage: &dyn BlobStorage, paths: I)
where
    I: IntoIterator<Item = String>,
{
    for path in paths {
        match storage.delete(&path).await {
            Ok(true) => tracing::debug!(%path, "deleted blob"),
            Ok(false) => tracing::debug!(%path, "blob already gone"),
            Err(err) => tracing::warn!(%path, error = %err, "failed to delete blob"),
        }
    }
}

/// Blobs written for a request that is not committed yet. Rolling back
/// removes them again.
pub struct StagedBlobs<'a> {
    storage: &'a dyn BlobStorage,
    paths: Vec<String>,
}

impl<'a> StagedBlobs<'a> {
    pub fn new(storage: &'a dyn BlobStorage) -> Self {
        Self {
            storage,
            paths: Vec::new(),
        }
    }

    pub async fn store(
        &mut self,
        folder: &str,
        file: &UploadedFile,
    ) -> Result<String, StorageError> {
        let path = self.storage.store(folder, file).await?;
        self.paths.push(path.clone());
        Ok(path)
    }

    pub async fn rollback(self) {
        discard(self.storage, self.paths).await;
    }
}
