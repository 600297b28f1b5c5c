//! Storage abstractions for tracked sections.
//!
//! The reconciliation pass only needs two things from persistence: the list
//! of tracked sections and a per-record status write. Registration adds an
//! upsert on top.
//!
//! ## Backends
//!
//! ```text
//! local:  {root}/sections.json                # one file, all records
//! s3:     {prefix}/sections/{record_key}.json # one object per record
//! ```

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::TrackedSection;

// Re-export for convenience
pub use local::LocalStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

/// Contents of the local `sections.json` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionsFile {
    /// ISO 8601 timestamp of last update
    pub updated_at: DateTime<Utc>,
    /// Total record count
    pub count: usize,
    pub sections: Vec<TrackedSection>,
}

impl SectionsFile {
    pub fn new(sections: Vec<TrackedSection>) -> Self {
        Self {
            updated_at: Utc::now(),
            count: sections.len(),
            sections,
        }
    }
}

/// Persistence collaborator for tracked sections.
///
/// Implementations must tolerate concurrent `save` calls for distinct
/// records. There is no transaction across records.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Load every tracked section.
    async fn list_tracked(&self) -> Result<Vec<TrackedSection>>;

    /// Overwrite the stored status of one existing record.
    async fn save(&self, section: &TrackedSection, open: bool) -> Result<()>;

    /// Insert a record, or refresh its status if the key already exists.
    async fn register(&self, section: &TrackedSection) -> Result<()>;
}
