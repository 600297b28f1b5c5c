//! Local filesystem storage implementation.
//!
//! Keeps every tracked section in a single `sections.json` under the root
//! directory. Writes go through a temp file and a rename, and an async mutex
//! serializes read-modify-write cycles so concurrent saves from one pass do
//! not clobber each other.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::TrackedSection;
use crate::storage::{SectionsFile, StatusStore};

const SECTIONS_KEY: &str = "sections.json";

/// Local filesystem storage backend.
pub struct LocalStore {
    root_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_sections(&self) -> Result<Vec<TrackedSection>> {
        match self.read_bytes(SECTIONS_KEY).await? {
            Some(bytes) => {
                let file: SectionsFile = serde_json::from_slice(&bytes)?;
                Ok(file.sections)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn write_sections(&self, sections: Vec<TrackedSection>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&SectionsFile::new(sections))?;
        self.write_bytes(SECTIONS_KEY, &bytes).await
    }
}

#[async_trait]
impl StatusStore for LocalStore {
    async fn list_tracked(&self) -> Result<Vec<TrackedSection>> {
        let sections = self.read_sections().await?;
        if sections.is_empty() {
            log::warn!("No tracked sections in {}", self.path(SECTIONS_KEY).display());
        }
        Ok(sections)
    }

    async fn save(&self, section: &TrackedSection, open: bool) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let key = section.record_key();
        let mut sections = self.read_sections().await?;
        let record = sections
            .iter_mut()
            .find(|s| s.record_key() == key)
            .ok_or_else(|| {
                AppError::store(format!(
                    "{} for {} is not tracked",
                    section.id, section.subscriber
                ))
            })?;

        record.open = open;
        self.write_sections(sections).await
    }

    async fn register(&self, section: &TrackedSection) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let key = section.record_key();
        let mut sections = self.read_sections().await?;
        match sections.iter_mut().find(|s| s.record_key() == key) {
            Some(existing) => existing.open = section.open,
            None => sections.push(section.clone()),
        }
        self.write_sections(sections).await
    }
}
