//! Filesystem blob store.
//!
//! Keys map to paths under a configurable root. Writes go to a temp file in
//! the destination directory and are renamed into place, so a partially
//! written blob is never observable under its final key.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::BlobStore;
use tracing::debug;

/// Blob store rooted at a local directory.
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The configured root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(Error::invalid_argument("empty blob key"));
        }
        // Keys are internal, but a traversal segment would escape the root.
        for segment in key.split('/') {
            if segment == ".." || segment.contains('\\') {
                return Err(Error::invalid_argument(format!("invalid blob key '{key}'")));
            }
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| Error::invalid_argument(format!("key '{key}' has no parent")))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::storage_io_with_source(format!("create dir for '{key}'"), e))?;

        let tmp = parent.join(format!(
            ".{}.tmp-{}",
            path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("blob"),
            uuid::Uuid::new_v4().simple()
        ));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| Error::storage_io_with_source(format!("write temp for '{key}'"), e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::storage_io_with_source(
                format!("rename into place for '{key}'"),
                e,
            ));
        }
        debug!(key, bytes = bytes.len(), "blob written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found(format!("blob '{key}'")))
            }
            Err(e) => Err(Error::storage_io_with_source(format!("read '{key}'"), e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::try_exists(&path)
            .await
            .map_err(|e| Error::storage_io_with_source(format!("stat '{key}'"), e))?)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage_io_with_source(format!("delete '{key}'"), e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let base = self.resolve(prefix.trim_end_matches('/'))?;
        let mut keys = Vec::new();
        let mut stack = vec![base];
        while let Some(dir) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(Error::storage_io_with_source(
                        format!("list '{prefix}'"),
                        e,
                    ));
                }
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Error::storage_io_with_source(format!("list '{prefix}'"), e))?
            {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root) {
                    let key = rel.to_string_lossy().replace('\\', "/");
                    // Skip in-flight temp files.
                    if !key
                        .rsplit('/')
                        .next()
                        .is_some_and(|name| name.starts_with('.'))
                    {
                        keys.push(key);
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
