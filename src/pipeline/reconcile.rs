// src/pipeline/reconcile.rs

//! Reconciliation pass.
//!
//! For every tracked section: fetch and parse the catalog status, compare it
//! with the stored status, notify the subscriber on a flip and persist the
//! new status. Sections are independent and run with bounded concurrency.
//!
//! Notification happens before the status write. If the write then fails the
//! section ends as `PersistError` and the same flip is rediscovered (and
//! notified again) on the next pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{QueryError, Result};
use crate::models::{
    AvailabilityStatus, Outcome, PassReport, ReconcileConfig, SectionId, SectionReport,
    TrackedSection,
};
use crate::services::{AvailabilityParser, CatalogFetcher, Notifier};
use crate::storage::StatusStore;

/// Runs reconciliation passes over the tracked sections in a store.
pub struct Reconciler {
    fetcher: Arc<dyn CatalogFetcher>,
    parser: Arc<dyn AvailabilityParser>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn StatusStore>,
    max_concurrent: usize,
    fetch_timeout: Duration,
    notify_timeout: Duration,
    persist_unchanged: bool,
}

impl Reconciler {
    pub fn new(
        fetcher: Arc<dyn CatalogFetcher>,
        parser: Arc<dyn AvailabilityParser>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn StatusStore>,
        config: &ReconcileConfig,
    ) -> Self {
        Self {
            fetcher,
            parser,
            notifier,
            store,
            max_concurrent: config.max_concurrent.max(1),
            fetch_timeout: config.fetch_timeout(),
            notify_timeout: config.notify_timeout(),
            persist_unchanged: config.persist_unchanged,
        }
    }

    /// Override the per-fetch and per-notify timeouts.
    pub fn with_timeouts(mut self, fetch: Duration, notify: Duration) -> Self {
        self.fetch_timeout = fetch;
        self.notify_timeout = notify;
        self
    }

    /// Fetch and parse the current status of one section.
    pub async fn query(
        &self,
        id: &SectionId,
    ) -> std::result::Result<AvailabilityStatus, QueryError> {
        let body = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(id))
            .await
            .map_err(|_| {
                QueryError::unreachable(format!(
                    "{id}: timed out after {}ms",
                    self.fetch_timeout.as_millis()
                ))
            })??;

        self.parser.parse(&body, id)
    }

    /// Run one full pass over every tracked section.
    ///
    /// Failing to list the tracked sections aborts the pass; everything
    /// after that is isolated per section.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Result<PassReport> {
        let sections = self.store.list_tracked().await?;
        Ok(self.reconcile_all(sections, cancel).await)
    }

    /// Reconcile a batch of sections.
    ///
    /// Once `cancel` fires no new sections are started; sections already in
    /// flight run to completion.
    pub async fn reconcile_all(
        &self,
        sections: Vec<TrackedSection>,
        cancel: &CancellationToken,
    ) -> PassReport {
        let started_at = Utc::now();
        let total = sections.len();
        log::info!(
            "Reconciling {} tracked sections ({} at a time)",
            total,
            self.max_concurrent
        );

        let mut indexed: Vec<(usize, SectionReport)> =
            stream::iter(sections.into_iter().enumerate())
                .take_while(|_| future::ready(!cancel.is_cancelled()))
                .map(|(index, section)| async move {
                    (index, self.reconcile_section(section).await)
                })
                .buffer_unordered(self.max_concurrent)
                .collect()
                .await;
        indexed.sort_by_key(|(index, _)| *index);

        let report = PassReport {
            started_at,
            finished_at: Utc::now(),
            total,
            skipped: total - indexed.len(),
            sections: indexed.into_iter().map(|(_, report)| report).collect(),
        };

        if report.skipped > 0 {
            log::warn!("Pass cancelled: {} sections not checked", report.skipped);
        }
        log::info!(
            "Pass complete: {} changed, {} unchanged, {} failed, {} persist errors, {} notified",
            report.changed(),
            report.unchanged(),
            report.query_failed(),
            report.persist_errors(),
            report.notifications_sent()
        );
        report
    }

    /// Reconcile one section and report its outcome.
    pub async fn reconcile_section(&self, mut section: TrackedSection) -> SectionReport {
        let status = match self.query(&section.id).await {
            Ok(status) => status,
            Err(error) => {
                log::warn!(
                    "Query failed for {} ({}): {}",
                    section.id,
                    section.subscriber,
                    error
                );
                return SectionReport {
                    id: section.id,
                    subscriber: section.subscriber,
                    status: None,
                    outcome: Outcome::QueryFailed {
                        kind: error.kind().to_string(),
                    },
                    notified: false,
                    error: Some(error.to_string()),
                };
            }
        };

        if status.open == section.open {
            log::debug!("{} unchanged (open={})", section.id, status.open);
            if self.persist_unchanged {
                if let Err(error) = self.store.save(&section, status.open).await {
                    log::warn!(
                        "Rewriting unchanged status for {} failed: {}",
                        section.id,
                        error
                    );
                }
            }
            return SectionReport {
                id: section.id,
                subscriber: section.subscriber,
                status: Some(status.open),
                outcome: Outcome::Unchanged,
                notified: false,
                error: None,
            };
        }

        log::info!(
            "{} is now {}, notifying {}",
            section.id,
            if status.open { "open" } else { "closed" },
            section.subscriber
        );
        let notified = self.notify(&section, status.open).await;

        section.open = status.open;
        let (outcome, error) = match self.store.save(&section, status.open).await {
            Ok(()) => (Outcome::Changed, None),
            Err(error) => {
                log::error!(
                    "Saving status for {} ({}) failed after notifying: {}",
                    section.id,
                    section.subscriber,
                    error
                );
                (Outcome::PersistError, Some(error.to_string()))
            }
        };

        SectionReport {
            id: section.id,
            subscriber: section.subscriber,
            status: Some(status.open),
            outcome,
            notified,
            error,
        }
    }

    /// Send the change notification; failures are logged and swallowed.
    async fn notify(&self, section: &TrackedSection, open: bool) -> bool {
        let send = self.notifier.notify(&section.subscriber, &section.id, open);
        match tokio::time::timeout(self.notify_timeout, send).await {
            Ok(Ok(())) => true,
            Ok(Err(error)) => {
                log::warn!("Notification for {} failed: {}", section.id, error);
                false
            }
            Err(_) => {
                log::warn!(
                    "Notification for {} timed out after {}ms",
                    section.id,
                    self.notify_timeout.as_millis()
                );
                false
            }
        }
    }
}
