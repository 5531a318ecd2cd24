//! Filesystem listing capability.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::UNIX_EPOCH;
use tracing::instrument;

#[cfg(feature = "cloud-storage")]
use object_store::{path::Path as ObjectPath, ObjectStore};
#[cfg(feature = "cloud-storage")]
use std::sync::Arc;

/// One entry of a directory listing.
///
/// Directories carry a trailing `/` in both `path` and `name`, and a size of 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Full path of the entry
    pub path: String,
    /// Final path segment
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification, milliseconds since the Unix epoch
    pub modification_time: i64,
}

impl FileInfo {
    /// True when the entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }

    /// Modification time as a UTC timestamp.
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.modification_time)
    }
}

/// Lists directory contents.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Returns the direct children of `path`, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory does not exist or cannot be read.
    async fn list(&self, path: &str) -> Result<Vec<FileInfo>>;
}

/// Lists the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    #[instrument(skip(self))]
    async fn list(&self, path: &str) -> Result<Vec<FileInfo>> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            let modification_time = metadata
                .modified()
                .ok()
                .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                .map(|elapsed| elapsed.as_millis() as i64)
                .unwrap_or_default();

            let mut entry_path = entry.path().to_string_lossy().into_owned();
            let mut name = entry.file_name().to_string_lossy().into_owned();
            let size = if metadata.is_dir() {
                entry_path.push('/');
                name.push('/');
                0
            } else {
                metadata.len()
            };

            files.push(FileInfo {
                path: entry_path,
                name,
                size,
                modification_time,
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

/// Lists an object store one level deep, treating common prefixes as
/// directories.
#[cfg(feature = "cloud-storage")]
#[derive(Debug, Clone)]
pub struct ObjectStoreFileSystem {
    store: Arc<dyn ObjectStore>,
}

#[cfg(feature = "cloud-storage")]
impl ObjectStoreFileSystem {
    /// Wraps an object store.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[cfg(feature = "cloud-storage")]
#[async_trait]
impl FileSystem for ObjectStoreFileSystem {
    #[instrument(skip(self))]
    async fn list(&self, path: &str) -> Result<Vec<FileInfo>> {
        let trimmed = path.trim_matches('/');
        let prefix = (!trimmed.is_empty()).then(|| ObjectPath::from(trimmed));
        let listing = self.store.list_with_delimiter(prefix.as_ref()).await?;

        let directories = listing.common_prefixes.into_iter().map(|dir| FileInfo {
            path: format!("{dir}/"),
            name: format!("{}/", dir.filename().unwrap_or_default()),
            size: 0,
            modification_time: 0,
        });
        let objects = listing.objects.into_iter().map(|meta| FileInfo {
            path: meta.location.to_string(),
            name: meta.location.filename().unwrap_or_default().to_string(),
            size: meta.size,
            modification_time: meta.last_modified.timestamp_millis(),
        });

        let mut files: Vec<FileInfo> = directories.chain(objects).collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}
