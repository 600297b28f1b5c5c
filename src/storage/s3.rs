//! AWS S3 storage implementation.
//!
//! One JSON object per tracked section at
//! `{prefix}/sections/{record_key}.json`, so concurrent saves from a pass
//! never touch the same object.

use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::error::{AppError, Result};
use crate::models::TrackedSection;
use crate::storage::StatusStore;

/// Concurrent object reads while listing.
const LIST_CONCURRENCY: usize = 16;

/// S3-based status store.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    /// Create a new S3 store instance.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Create an S3 store from environment configuration.
    pub async fn from_env() -> Result<Self> {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = Client::new(&config);

        let bucket =
            std::env::var("S3_BUCKET").unwrap_or_else(|_| "class-checker".to_string());
        let prefix = std::env::var("S3_PREFIX").unwrap_or_else(|_| "class-checker".to_string());

        Ok(Self::new(client, bucket, prefix))
    }

    fn sections_prefix(&self) -> String {
        format!("{}/sections/", self.prefix.trim_end_matches('/'))
    }

    fn object_key(&self, section: &TrackedSection) -> String {
        format!("{}{}.json", self.sections_prefix(), section.record_key())
    }

    /// List every record object key under the sections prefix.
    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(self.sections_prefix())
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| AppError::store(e.into_service_error()))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .filter(|key| key.ends_with(".json"))
                    .map(str::to_string),
            );
        }
        Ok(keys)
    }

    /// Read one record.
    async fn read_section(&self, key: String) -> Result<TrackedSection> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| AppError::store(e.into_service_error()))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::store(format!("s3://{}/{}: {}", self.bucket, key, e)))?;
        Ok(serde_json::from_slice(&bytes.into_bytes())?)
    }

    /// Write one record.
    async fn write_section(&self, section: &TrackedSection) -> Result<()> {
        let key = self.object_key(section);
        let json = serde_json::to_vec_pretty(section)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(json))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| AppError::store(e.into_service_error()))?;

        log::debug!("Wrote s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

#[async_trait]
impl StatusStore for S3Store {
    async fn list_tracked(&self) -> Result<Vec<TrackedSection>> {
        let keys = self.list_keys().await?;
        log::info!(
            "Loading {} tracked sections from s3://{}/{}",
            keys.len(),
            self.bucket,
            self.sections_prefix()
        );

        stream::iter(keys)
            .map(|key| self.read_section(key))
            .buffered(LIST_CONCURRENCY)
            .try_collect()
            .await
    }

    async fn save(&self, section: &TrackedSection, open: bool) -> Result<()> {
        let mut updated = section.clone();
        updated.open = open;
        self.write_section(&updated).await
    }

    async fn register(&self, section: &TrackedSection) -> Result<()> {
        self.write_section(section).await
    }
}
