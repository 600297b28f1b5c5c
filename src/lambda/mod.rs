// src/lambda/mod.rs

//! AWS Lambda handler for the checker.
//!
//! Each invocation (typically a scheduled EventBridge rule):
//! 1. Builds configuration from defaults plus environment overrides
//! 2. Opens the S3 status store
//! 3. Runs one reconciliation pass
//! 4. Returns the pass report as the response payload

use std::sync::Arc;
use std::time::Duration;

use lambda_runtime::{Error as LambdaError, LambdaEvent};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::Result;
use crate::models::{Config, PassReport};
use crate::pipeline::Checker;
use crate::storage::s3::S3Store;

/// Upper bound on the time kept in reserve before the Lambda deadline to
/// finish in-flight sections and return the report.
const MAX_DEADLINE_RESERVE: Duration = Duration::from_secs(15);

/// Lambda invocation payload.
#[derive(Debug, Default, Deserialize)]
pub struct CheckRequest {
    /// Include the per-section report lines in the response
    #[serde(default)]
    pub include_lines: bool,
}

/// Lambda response payload.
#[derive(Debug, Default, Serialize)]
pub struct CheckResponse {
    /// Whether the pass ran and checked at least one section
    pub success: bool,

    /// Full pass report
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<PassReport>,

    /// Plain-text rendering of the pass, one entry per section
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<String>,

    /// Error message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

/// Main Lambda handler function.
#[instrument(skip(event))]
pub async fn handler(
    event: LambdaEvent<CheckRequest>,
) -> std::result::Result<CheckResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (request, context) = event.into_parts();

    let cancel = CancellationToken::new();
    let remaining = context
        .deadline()
        .duration_since(std::time::SystemTime::now())
        .unwrap_or_default();
    let timer = stop_starting_after(remaining).map(|after| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            cancel.cancel();
        })
    });

    let result = run_check(&cancel).await;
    if let Some(timer) = timer {
        timer.abort();
    }
    let execution_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(report) => {
            info!(
                changed = report.changed(),
                unchanged = report.unchanged(),
                failed = report.query_failed(),
                persist_errors = report.persist_errors(),
                skipped = report.skipped,
                "Pass completed in {}ms",
                execution_time_ms
            );
            let error = nothing_checked(&report);
            if let Some(message) = &error {
                warn!("{}", message);
            }
            let lines = if request.include_lines {
                report.sections.iter().map(|s| s.render_line()).collect()
            } else {
                Vec::new()
            };
            Ok(CheckResponse {
                success: error.is_none(),
                report: Some(report),
                lines,
                error,
                execution_time_ms,
            })
        }
        Err(e) => {
            error!("Pass failed: {}", e);
            Ok(CheckResponse {
                error: Some(e.to_string()),
                execution_time_ms,
                ..Default::default()
            })
        }
    }
}

/// Delay after which no new sections are started.
///
/// The reserve is a quarter of the remaining time, capped at
/// [`MAX_DEADLINE_RESERVE`]. Returns `None` when the deadline is unknown or
/// already past, in which case the pass is left to run.
fn stop_starting_after(remaining: Duration) -> Option<Duration> {
    if remaining.is_zero() {
        return None;
    }
    Some(remaining - MAX_DEADLINE_RESERVE.min(remaining / 4))
}

/// Error for a pass that had sections but checked none of them.
fn nothing_checked(report: &PassReport) -> Option<String> {
    if report.total > 0 && report.sections.is_empty() {
        return Some(format!(
            "deadline reached before any of {} tracked sections was checked",
            report.total
        ));
    }
    None
}

/// Internal pass logic.
async fn run_check(cancel: &CancellationToken) -> Result<PassReport> {
    let store = Arc::new(S3Store::from_env().await?);
    let config = load_lambda_config();
    let checker = Checker::from_config(&config, store)?;
    checker.check(cancel).await
}

/// Load configuration suitable for the Lambda environment.
///
/// A bundled config file is used when `CONFIG_PATH` points at one; secrets
/// always come from the environment.
fn load_lambda_config() -> Config {
    let mut config = match std::env::var("CONFIG_PATH") {
        Ok(path) => Config::load_or_default(path),
        Err(_) => Config::default(),
    };
    config.apply_env_overrides();
    config
}
