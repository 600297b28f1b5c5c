// src/pipeline/check.rs

//! Wiring from configuration to a ready reconciler.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{
    AvailabilityStatus, CatalogVariant, Config, PassReport, SectionId, TrackedSection,
};
use crate::services::{
    AvailabilityParser, CatalogClient, TokenProvider, notifier_from_config, parser_for,
    provider_from_config,
};
use crate::storage::StatusStore;
use crate::utils::http;

use super::reconcile::Reconciler;
use super::register::Registrar;

/// Entry point for every checker operation.
pub struct Checker {
    reconciler: Reconciler,
    store: Arc<dyn StatusStore>,
    tokens: Option<Arc<dyn TokenProvider>>,
}

impl Checker {
    /// Build the catalog client, parser and notifier described by `config`.
    pub fn from_config(config: &Config, store: Arc<dyn StatusStore>) -> Result<Self> {
        config.validate()?;

        let client = http::create_async_client(&config.catalog)?;
        let tokens = match config.catalog.variant {
            CatalogVariant::Api => Some(provider_from_config(&client, &config.token)?),
            CatalogVariant::Legacy => None,
        };
        let catalog = CatalogClient::new(client.clone(), config.catalog.clone(), tokens.clone())?;
        let parser: Arc<dyn AvailabilityParser> = Arc::from(parser_for(config.catalog.variant));
        let notifier = notifier_from_config(&client, &config.mail);

        let reconciler = Reconciler::new(
            Arc::new(catalog),
            parser,
            notifier,
            store.clone(),
            &config.reconcile,
        );

        Ok(Self {
            reconciler,
            store,
            tokens,
        })
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Run one reconciliation pass.
    ///
    /// A token that cannot be obtained up front fails the whole pass rather
    /// than every section individually.
    pub async fn check(&self, cancel: &CancellationToken) -> Result<PassReport> {
        if let Some(tokens) = &self.tokens {
            tokens.bearer_token().await?;
        }
        self.reconciler.run_pass(cancel).await
    }

    /// Current catalog status of one section; the store is not touched.
    pub async fn probe(&self, id: &SectionId) -> Result<AvailabilityStatus> {
        let id = id.normalized();
        id.validate()?;
        Ok(self.reconciler.query(&id).await?)
    }

    /// Start tracking a section for a subscriber.
    pub async fn register(&self, id: &SectionId, subscriber: &str) -> Result<TrackedSection> {
        Registrar::new(&self.reconciler, self.store.as_ref())
            .register(id, subscriber)
            .await
    }

    /// Tracked sections, optionally only those of one subscriber.
    pub async fn list(&self, subscriber: Option<&str>) -> Result<Vec<TrackedSection>> {
        let sections = self.store.list_tracked().await?;
        Ok(match subscriber.map(str::trim) {
            Some(subscriber) => sections
                .into_iter()
                .filter(|s| s.subscriber.eq_ignore_ascii_case(subscriber))
                .collect(),
            None => sections,
        })
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use tempfile::TempDir;

    use super::*;
    use crate::error::AppError;
    use crate::models::Outcome;
    use crate::services::HtmlParser;
    use crate::storage::LocalStore;

    fn course_guide(section: &str, status: &str) -> String {
        format!(
            "<html><body>{}</b></td><td>LEC</td><td><span>{status}</span></td></tr></table></body></html>",
            HtmlParser::row_marker(section)
        )
    }

    fn legacy_config(server_url: &str) -> Config {
        let mut config = Config::default();
        config.catalog.variant = CatalogVariant::Legacy;
        config.catalog.legacy_url_prefix = format!("{server_url}/cg/cg_sections.aspx?content=");
        config
    }

    #[tokio::test]
    async fn test_register_then_check_detects_flip() {
        let mut server = mockito::Server::new_async().await;
        let open = server
            .mock("GET", "/cg/cg_sections.aspx")
            .match_query(Matcher::Any)
            .with_body(course_guide("001", "Open"))
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(tmp.path()));
        let checker = Checker::from_config(&legacy_config(&server.url()), store).unwrap();

        let id = SectionId::new("2010", "LSA", "EECS", "281", "001");
        let section = checker.register(&id, "a@umich.edu").await.unwrap();
        assert!(section.open);

        open.remove_async().await;
        server
            .mock("GET", "/cg/cg_sections.aspx")
            .match_query(Matcher::Any)
            .with_body(course_guide("001", "Closed"))
            .create_async()
            .await;

        let report = checker.check(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.sections[0].outcome, Outcome::Changed);
        assert_eq!(report.sections[0].status, Some(false));
        assert!(report.sections[0].notified);

        let stored = checker.list(None).await.unwrap();
        assert!(!stored[0].open);

        let again = checker.check(&CancellationToken::new()).await.unwrap();
        assert_eq!(again.sections[0].outcome, Outcome::Unchanged);
    }

    #[tokio::test]
    async fn test_list_filters_by_subscriber() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/cg/cg_sections.aspx")
            .match_query(Matcher::Any)
            .with_body(course_guide("001", "Open"))
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(tmp.path()));
        let checker = Checker::from_config(&legacy_config(&server.url()), store).unwrap();

        let id = SectionId::new("2010", "LSA", "EECS", "281", "001");
        checker.register(&id, "a@umich.edu").await.unwrap();
        checker.register(&id, "b@umich.edu").await.unwrap();

        assert_eq!(checker.list(None).await.unwrap().len(), 2);
        let mine = checker.list(Some("A@umich.edu")).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].subscriber, "a@umich.edu");
    }

    #[tokio::test]
    async fn test_probe_does_not_store() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/cg/cg_sections.aspx")
            .match_query(Matcher::Any)
            .with_body(course_guide("002", "Closed"))
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(tmp.path()));
        let checker = Checker::from_config(&legacy_config(&server.url()), store).unwrap();

        let id = SectionId::new("2010", "LSA", "EECS", "281", "002");
        assert_eq!(checker.probe(&id).await.unwrap(), AvailabilityStatus::closed());
        assert!(checker.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_token_failure_fails_pass() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(401)
            .create_async()
            .await;

        let mut config = Config::default();
        config.token.token_url = format!("{}/token", server.url());
        config.token.consumer_key = "key".to_string();
        config.token.consumer_secret = "secret".to_string();

        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(tmp.path()));
        let checker = Checker::from_config(&config, store).unwrap();

        let result = checker.check(&CancellationToken::new()).await;
        assert!(matches!(result, Err(AppError::Token(_))));
    }

    #[test]
    fn test_api_without_token_source_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(tmp.path()));
        assert!(Checker::from_config(&Config::default(), store).is_err());
    }
}
