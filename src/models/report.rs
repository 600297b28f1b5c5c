//! Per-section outcomes and the pass report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::SectionId;

/// Terminal state of one section after one pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Catalog status matches the stored status
    Unchanged,
    /// Status flipped; the subscriber was notified and the store updated
    Changed,
    /// Fetch or parse failed; nothing was mutated
    QueryFailed { kind: String },
    /// Status flipped and the subscriber was notified, but the write failed
    PersistError,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Unchanged => "unchanged",
            Outcome::Changed => "changed",
            Outcome::QueryFailed { .. } => "query_failed",
            Outcome::PersistError => "persist_error",
        }
    }
}

/// Result of reconciling one tracked section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionReport {
    #[serde(flatten)]
    pub id: SectionId,

    pub subscriber: String,

    /// Status seen in the catalog, if the query succeeded
    pub status: Option<bool>,

    #[serde(flatten)]
    pub outcome: Outcome,

    /// Whether a notification was delivered
    pub notified: bool,

    /// Human-readable error detail for failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SectionReport {
    /// Render one line in the trigger's plain-text format.
    pub fn render_line(&self) -> String {
        let Some(status) = self.status else {
            return format!(
                "Error loading the page for a class: {}",
                self.error.as_deref().unwrap_or("unknown error")
            );
        };

        let mut line = format!(
            "Page body retrieved for: {} - Status: {}",
            self.id, status
        );
        match self.outcome {
            Outcome::Unchanged => line.push_str(" - Status hasn't changed"),
            Outcome::Changed | Outcome::PersistError => {
                line.push_str(&format!(
                    " - Status changed, notifying {}",
                    self.subscriber
                ));
                if !self.notified {
                    line.push_str(" (notification failed)");
                }
                if self.outcome == Outcome::PersistError {
                    line.push_str(&format!(
                        " - Failed to save status: {}",
                        self.error.as_deref().unwrap_or("unknown error")
                    ));
                }
            }
            Outcome::QueryFailed { .. } => {}
        }
        line
    }
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Number of tracked sections loaded from the store
    pub total: usize,

    /// Sections never started because the pass was cancelled
    pub skipped: usize,

    pub sections: Vec<SectionReport>,
}

impl PassReport {
    fn count(&self, label: &str) -> usize {
        self.sections
            .iter()
            .filter(|s| s.outcome.label() == label)
            .count()
    }

    pub fn changed(&self) -> usize {
        self.count("changed")
    }

    pub fn unchanged(&self) -> usize {
        self.count("unchanged")
    }

    pub fn query_failed(&self) -> usize {
        self.count("query_failed")
    }

    pub fn persist_errors(&self) -> usize {
        self.count("persist_error")
    }

    pub fn notifications_sent(&self) -> usize {
        self.sections.iter().filter(|s| s.notified).count()
    }

    /// Find the report for a section and subscriber.
    pub fn find(&self, id: &SectionId, subscriber: &str) -> Option<&SectionReport> {
        self.sections
            .iter()
            .find(|s| &s.id == id && s.subscriber == subscriber)
    }

    /// Render the whole pass as plain text, one line per section.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            out.push_str(&section.render_line());
            out.push('\n');
        }
        if self.skipped > 0 {
            out.push_str(&format!("Pass cancelled, {} sections skipped\n", self.skipped));
        }
        out
    }
}
