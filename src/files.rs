use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{FileRecord, NewFileRecord};
use crate::repo::{Repo, RepoError};
use crate::storage::{ObjectStore, ObjectStoreError};
use crate::upload::{sanitize_file_name, BufferedFile};

#[derive(Debug, Error)]
pub enum FileServiceError {
    #[error("repository: {0}")]
    Repo(#[from] RepoError),
    #[error("upload: {0}")]
    Upload(ObjectStoreError),
    #[error("download: {0}")]
    Download(ObjectStoreError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves logical file names to bytes, keeping a local disk copy of each
/// stored object and fetching it from the object store on a cache miss.
#[derive(Clone)]
pub struct FileService {
    repo: Arc<dyn Repo>,
    store: Arc<dyn ObjectStore>,
    cache_dir: PathBuf,
}

impl FileService {
    pub fn new(repo: Arc<dyn Repo>, store: Arc<dyn ObjectStore>, cache_dir: impl Into<PathBuf>) -> Self {
        Self { repo, store, cache_dir: cache_dir.into() }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Local cache location for a storage key.
    pub fn local_path(&self, storage_path: &str) -> PathBuf {
        // keys are flat; keep them inside the cache directory
        let name = Path::new(storage_path)
            .file_name()
            .map(|n| n.to_owned())
            .unwrap_or_else(|| OsString::from("_"));
        self.cache_dir.join(name)
    }

    /// Writes the bytes to the object store under a fresh unique key and returns that key.
    pub async fn upload_file(&self, file: BufferedFile) -> Result<String, FileServiceError> {
        let key = format!(
            "{}-{}-{}",
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            sanitize_file_name(&file.file_name)
        );
        self.store
            .put(&key, &file.content_type, file.bytes)
            .await
            .map_err(FileServiceError::Upload)?;
        info!(key = %key, field = %file.field, "uploaded file");
        Ok(key)
    }

    pub async fn save_file(&self, file_name: &str, storage_path: &str) -> Result<FileRecord, FileServiceError> {
        let rec = self
            .repo
            .create_file_record(NewFileRecord { file_name: file_name.to_owned(), storage_path: storage_path.to_owned() })
            .await?;
        Ok(rec)
    }

    /// Best-effort removal of every copy stored under `file_name`, then of the
    /// records themselves. Unknown names are a no-op.
    pub async fn delete_file(&self, file_name: &str) -> Result<(), FileServiceError> {
        let records = self.repo.find_files(file_name).await?;
        if records.is_empty() {
            return Ok(());
        }
        for rec in &records {
            let local = self.local_path(&rec.storage_path);
            if let Err(e) = tokio::fs::remove_file(&local).await {
                debug!(path = %local.display(), "local copy not removed: {e}");
            }
            if let Err(e) = self.store.delete(&rec.storage_path).await {
                warn!(key = %rec.storage_path, "remote copy not removed: {e}");
            }
        }
        let removed = self.repo.delete_files(file_name).await?;
        info!(file_name, removed, "deleted file records");
        Ok(())
    }

    /// Drops an uploaded object that never got a record. Failures are only logged.
    pub async fn discard_upload(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(key, "orphaned upload left behind: {e}");
        }
        let _ = tokio::fs::remove_file(self.local_path(key)).await;
    }

    /// Downloads the stored object into the local cache. `false` when no record exists.
    pub async fn sync_file(&self, file_name: &str) -> Result<bool, FileServiceError> {
        let rec = match self.repo.find_file(file_name).await {
            Ok(r) => r,
            Err(RepoError::NotFound) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let bytes = self.store.get(&rec.storage_path).await.map_err(FileServiceError::Download)?;
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        tokio::fs::write(self.local_path(&rec.storage_path), bytes).await?;
        info!(file_name, key = %rec.storage_path, "synced file from object store");
        Ok(true)
    }

    /// Opens the cached copy, filling the cache first when it is missing.
    /// `None` means there is nothing to serve under that name.
    pub async fn get_file_read_stream(
        &self,
        file_name: &str,
    ) -> Result<Option<(tokio::fs::File, FileRecord)>, FileServiceError> {
        let rec = match self.repo.find_file(file_name).await {
            Ok(r) => r,
            Err(RepoError::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let path = self.local_path(&rec.storage_path);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if !meta.is_file() => return Ok(None),
            Ok(_) => {}
            Err(_) => {
                if !self.sync_file(file_name).await? {
                    return Ok(None);
                }
            }
        }
        let file = tokio::fs::File::open(&path).await?;
        Ok(Some((file, rec)))
    }
}
