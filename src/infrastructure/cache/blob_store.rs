//! Durable blob filesystem backing the persistent cache

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

use crate::application::errors::CacheError;

/// Minimal blob filesystem contract: one named blob per cache entry
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn create_dir(&self) -> Result<(), CacheError>;
    async fn read(&self, name: &str) -> Result<Vec<u8>, CacheError>;
    async fn write(&self, name: &str, contents: &[u8]) -> Result<(), CacheError>;
    async fn delete(&self, name: &str) -> Result<(), CacheError>;
    async fn list(&self) -> Result<Vec<String>, CacheError>;
}

/// Blob store over a dedicated cache directory on the local filesystem
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.tmp"))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn create_dir(&self) -> Result<(), CacheError> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).await?;
            debug!(directory = %self.root.display(), "created cache directory");
        }
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, CacheError> {
        Ok(fs::read(self.path(name)).await?)
    }

    async fn write(&self, name: &str, contents: &[u8]) -> Result<(), CacheError> {
        self.create_dir().await?;

        // Write to a temporary file and rename so readers never observe a
        // partially-written blob
        let temp = self.temp_path(name);
        fs::write(&temp, contents).await?;
        fs::rename(&temp, self.path(name)).await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), CacheError> {
        fs::remove_file(self.path(name)).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, CacheError> {
        let mut names = Vec::new();
        if !self.root.exists() {
            return Ok(names);
        }

        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_read_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path().to_path_buf());

        store.write("entry.json", b"payload").await.unwrap();
        let read = store.read("entry.json").await.unwrap();
        assert_eq!(read, b"payload");
    }

    #[tokio::test]
    async fn test_read_missing_blob_errors() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path().to_path_buf());

        assert!(store.read("absent.json").await.is_err());
    }

    #[tokio::test]
    async fn test_list_only_json_blobs() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path().to_path_buf());

        store.write("a.json", b"1").await.unwrap();
        store.write("b.json", b"2").await.unwrap();
        tokio::fs::write(temp_dir.path().join("stray.txt"), b"x")
            .await
            .unwrap();

        let mut names = store.list().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[tokio::test]
    async fn test_delete_removes_blob() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path().to_path_buf());

        store.write("gone.json", b"1").await.unwrap();
        store.delete("gone.json").await.unwrap();
        assert!(store.read("gone.json").await.is_err());
    }

    #[tokio::test]
    async fn test_creates_directory_on_demand() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested").join("cache");
        let store = FsBlobStore::new(nested.clone());

        store.write("entry.json", b"payload").await.unwrap();
        assert!(nested.exists());
    }
}
