// src/pipeline/register.rs

//! Section registration.
//!
//! A section is only tracked once the catalog confirms it exists; its current
//! status becomes the stored status, so the first pass after registration
//! only notifies on a real flip.

use crate::error::{AppError, Result};
use crate::models::{SectionId, TrackedSection};
use crate::storage::StatusStore;

use super::reconcile::Reconciler;

/// Adds sections to the tracked set.
pub struct Registrar<'a> {
    reconciler: &'a Reconciler,
    store: &'a dyn StatusStore,
}

impl<'a> Registrar<'a> {
    pub fn new(reconciler: &'a Reconciler, store: &'a dyn StatusStore) -> Self {
        Self { reconciler, store }
    }

    /// Validate, look up and store a section for a subscriber.
    ///
    /// Subscribers are trimmed and lower-cased. Re-registering an existing
    /// (section, subscriber) pair refreshes its stored status.
    pub async fn register(&self, id: &SectionId, subscriber: &str) -> Result<TrackedSection> {
        let id = id.normalized();
        id.validate()?;

        let subscriber = subscriber.trim().to_lowercase();
        if subscriber.is_empty() {
            return Err(AppError::validation("subscriber must not be empty"));
        }

        let status = self.reconciler.query(&id).await?;
        let section = TrackedSection::new(id, subscriber, status.open);
        self.store.register(&section).await?;

        log::info!(
            "Tracking {} for {} (currently {})",
            section.id,
            section.subscriber,
            if section.open { "open" } else { "closed" }
        );
        Ok(section)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::error::QueryError;
    use crate::models::{MailConfig, ReconcileConfig};
    use crate::services::{CatalogFetcher, JsonParser, LogNotifier};
    use crate::storage::LocalStore;

    /// Serves open seats for section 001 and nothing else.
    struct OneSection;

    #[async_trait]
    impl CatalogFetcher for OneSection {
        async fn fetch(&self, id: &SectionId) -> std::result::Result<String, QueryError> {
            if id.section == "001" {
                Ok(r#"{"getSOCSectionDetailResponse":{"AvailableSeats":"7"}}"#.to_string())
            } else {
                Ok(format!(
                    r#"{{"ErrorMessage":"{}"}}"#,
                    crate::services::NOT_AVAILABLE_SENTINEL
                ))
            }
        }
    }

    fn reconciler(store: Arc<LocalStore>) -> Reconciler {
        Reconciler::new(
            Arc::new(OneSection),
            Arc::new(JsonParser),
            Arc::new(LogNotifier::new(MailConfig::default())),
            store,
            &ReconcileConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_register_stores_current_status() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(tmp.path()));
        let reconciler = reconciler(store.clone());

        let id = SectionId::new("2010", "ENG", " eecs ", "281", "001");
        let section = Registrar::new(&reconciler, store.as_ref())
            .register(&id, " a@umich.edu ")
            .await
            .unwrap();

        assert_eq!(section.id.subject, "EECS");
        assert_eq!(section.subscriber, "a@umich.edu");
        assert!(section.open);

        let stored = store.list_tracked().await.unwrap();
        assert_eq!(stored, vec![section]);
    }

    #[tokio::test]
    async fn test_register_folds_subscriber_case() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(tmp.path()));
        let reconciler = reconciler(store.clone());
        let registrar = Registrar::new(&reconciler, store.as_ref());

        let id = SectionId::new("2010", "ENG", "EECS", "281", "001");
        let first = registrar.register(&id, "Student@UMich.edu").await.unwrap();
        let second = registrar.register(&id, "student@umich.edu").await.unwrap();

        assert_eq!(first.subscriber, "student@umich.edu");
        assert_eq!(first.record_key(), second.record_key());
        assert_eq!(store.list_tracked().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_missing_section() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(tmp.path()));
        let reconciler = reconciler(store.clone());

        let id = SectionId::new("2010", "ENG", "EECS", "281", "099");
        let err = Registrar::new(&reconciler, store.as_ref())
            .register(&id, "a@umich.edu")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Query(QueryError::NotFound(_))));
        assert!(store.list_tracked().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(tmp.path()));
        let reconciler = reconciler(store.clone());
        let registrar = Registrar::new(&reconciler, store.as_ref());

        let bad_subject = SectionId::new("2010", "ENG", "EE/CS", "281", "001");
        assert!(matches!(
            registrar.register(&bad_subject, "a@umich.edu").await,
            Err(AppError::Validation(_))
        ));

        let id = SectionId::new("2010", "ENG", "EECS", "281", "001");
        assert!(matches!(
            registrar.register(&id, "   ").await,
            Err(AppError::Validation(_))
        ));
    }
}
