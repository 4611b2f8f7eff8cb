//! Per-run text logs written to the bucket.

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::error::AppError;
use crate::models::RunSummary;
use crate::storage::{ObjectStore, keys};

/// Kind of run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Success,
    Error,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Success => "success",
            ReportKind::Error => "error",
        }
    }
}

/// Text log describing one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub kind: ReportKind,
    pub at: DateTime<Utc>,
    pub body: String,
}

impl RunReport {
    pub fn success(summary: &RunSummary, at: DateTime<Utc>) -> Self {
        let body = format!(
            "Monitoring run completed: {}\n\
             Environment: {}\n\
             Execution time: {:.2} seconds\n\
             PDFs found: {}\n\
             New documents: {}\n\
             Documents processed: {}\n\
             Documents failed: {}\n\
             Skipped for deadline: {}\n\
             Listing changes: +{} / -{}\n\
             Updates detected: {}\n\
             Updates: [{}]\n\
             Email sent: {}",
            at.to_rfc3339(),
            summary.environment,
            summary.execution_time,
            summary.bulletins_found,
            summary.new_bulletins,
            summary.documents_processed,
            summary.documents_failed,
            summary.skipped_for_deadline,
            summary.listing_added,
            summary.listing_removed,
            summary.updates_found(),
            summary.update_names().join(", "),
            summary.email_sent,
        );

        Self {
            kind: ReportKind::Success,
            at,
            body,
        }
    }

    pub fn failure(err: &AppError, at: DateTime<Utc>) -> Self {
        Self {
            kind: ReportKind::Error,
            at,
            body: format!("Monitoring run failed: {}\nTimestamp: {}", err, at.to_rfc3339()),
        }
    }

    pub fn key(&self) -> String {
        keys::run_log(self.kind.as_str(), self.at)
    }

    /// Write the log to storage. Failures are logged, never propagated.
    pub async fn save(&self, store: &dyn ObjectStore) -> Option<String> {
        let key = self.key();
        match store
            .put(&key, self.body.clone().into_bytes(), "text/plain")
            .await
        {
            Ok(()) => {
                info!(location = %store.location(&key), "Run log saved");
                Some(key)
            }
            Err(e) => {
                error!(error = %e, "Failed to save run log");
                None
            }
        }
    }
}
