//! File-based gateway: one pretty-printed JSON file per library.
//!
//! ```text
//! <libraries>/
//! ├── .lock            # fs2 exclusive lock held while writing
//! ├── fiction.json
//! └── poetry.json
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::fs;

use super::{Gateway, PersistenceError};
use crate::domain::Library;

const LOCK_FILE: &str = ".lock";
const EXTENSION: &str = "json";

/// Gateway storing libraries as `<dir>/<name>.json`
#[derive(Debug, Clone)]
pub struct FileGateway {
    dir: PathBuf,
}

impl FileGateway {
    /// Create a gateway rooted at `dir` (created on first save)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create a gateway for the configured libraries directory
    pub fn from_config() -> anyhow::Result<Self> {
        Ok(Self::new(crate::config::libraries_dir()?))
    }

    /// Path of the file backing a library
    pub fn library_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, EXTENSION))
    }
}

#[async_trait]
impl Gateway for FileGateway {
    fn name(&self) -> &str {
        "file"
    }

    async fn list(&self) -> Result<Vec<String>, PersistenceError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    names.push(stem.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn load(&self, name: &str) -> Result<Option<Value>, PersistenceError> {
        let path = self.library_path(name);

        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn save(&self, name: &str, library: &Library) -> Result<(), PersistenceError> {
        let content = serde_json::to_string_pretty(library)?;
        let dir = self.dir.clone();
        let path = self.library_path(name);

        tokio::task::spawn_blocking(move || write_atomically(&dir, &path, content.as_bytes()))
            .await
            .map_err(|e| PersistenceError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }

    async fn delete(&self, name: &str) -> Result<(), PersistenceError> {
        match fs::remove_file(self.library_path(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write through a temp file in the same directory and rename it into
/// place while holding the directory lock.
fn write_atomically(dir: &Path, path: &Path, content: &[u8]) -> Result<(), PersistenceError> {
    std::fs::create_dir_all(dir)?;

    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(dir.join(LOCK_FILE))?;
    lock.lock_exclusive()
        .map_err(|e| PersistenceError::Lock(e.to_string()))?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| PersistenceError::Io(e.error))?;

    // Lock is released when `lock` is dropped
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BookDetail, BookId, BookSummary};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_dir_lists_nothing() {
        let temp = TempDir::new().unwrap();
        let gateway = FileGateway::new(temp.path().join("nope"));

        assert!(gateway.list().await.unwrap().is_empty());
        assert!(gateway.load("anything").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_writes_pretty_json_with_string_keys() {
        let temp = TempDir::new().unwrap();
        let gateway = FileGateway::new(temp.path());

        let mut library = Library::new();
        library.prepend(BookSummary::blank(BookId::new(1)), BookDetail::default());
        gateway.save("fiction", &library).await.unwrap();

        let written = std::fs::read_to_string(gateway.library_path("fiction")).unwrap();
        assert!(written.contains("\n  \"summary\""));
        assert!(written.contains("\"1\": {"));
        assert!(written.contains("\"mainImage\""));
    }

    #[tokio::test]
    async fn test_list_skips_lock_and_foreign_files() {
        let temp = TempDir::new().unwrap();
        let gateway = FileGateway::new(temp.path());

        gateway.save("b", &Library::new()).await.unwrap();
        gateway.save("a", &Library::new()).await.unwrap();
        std::fs::write(temp.path().join("notes.txt"), "x").unwrap();

        assert_eq!(gateway.list().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let temp = TempDir::new().unwrap();
        let gateway = FileGateway::new(temp.path());

        assert!(gateway.delete("ghost").await.is_ok());
    }

    #[tokio::test]
    async fn test_load_legacy_array_as_raw() {
        let temp = TempDir::new().unwrap();
        let gateway = FileGateway::new(temp.path());
        std::fs::write(gateway.library_path("old"), r#"[{"title": "T"}]"#).unwrap();

        let raw = gateway.load("old").await.unwrap().unwrap();
        assert!(raw.is_array());
    }
}
