use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Durable home of the store snapshot, read and written as one blob.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn load(&self) -> StorageResult<Option<String>>;

    async fn save(&self, blob: &str) -> StorageResult<()>;

    async fn clear(&self) -> StorageResult<()>;
}

#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl BlobStorage for JsonFileStorage {
    async fn load(&self) -> StorageResult<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(blob) => Ok(Some(blob)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes through a sibling temp file so a crash never leaves half a blob.
    async fn save(&self, blob: &str) -> StorageResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, blob).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Process-local storage, handy for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blob: Mutex<Option<String>>,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Mutex::new(Some(blob.into())),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.blob.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStorage for MemoryStorage {
    async fn load(&self) -> StorageResult<Option<String>> {
        Ok(self.blob.lock().clone())
    }

    async fn save(&self, blob: &str) -> StorageResult<()> {
        *self.blob.lock() = Some(blob.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        *self.blob.lock() = None;
        Ok(())
    }
}
