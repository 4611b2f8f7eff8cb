//! Run summary and invocation result payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::AppError;
use crate::models::BulletinUpdate;

/// Outcome of one monitoring run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub environment: String,

    /// Bulletins found on the listing pages
    pub bulletins_found: usize,

    /// Bulletins (within the per-run limit) with no processed marker
    pub new_bulletins: usize,

    /// Documents downloaded and archived. Non-matching ones are marked at
    /// once; matching ones only after the email is accepted.
    pub documents_processed: usize,

    /// Documents that failed and will be retried on the next run
    pub documents_failed: usize,

    /// Documents left for the next run because the deadline was near
    pub skipped_for_deadline: usize,

    /// Links added to or removed from the listing since the last run
    pub listing_added: usize,
    pub listing_removed: usize,

    /// Documents that matched at least one keyword
    pub updates: Vec<BulletinUpdate>,

    pub email_sent: bool,

    /// Wall-clock duration in seconds
    pub execution_time: f64,
}

impl RunSummary {
    pub fn updates_found(&self) -> usize {
        self.updates.len()
    }

    /// File names of the matched documents.
    pub fn update_names(&self) -> Vec<&str> {
        self.updates.iter().map(|u| u.pdf.as_str()).collect()
    }
}

/// Response returned to the invoker.
///
/// Serialized as `{"statusCode": ..., "body": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvocationResult {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: Value,
}

impl InvocationResult {
    /// 200 response carrying the analysis details of a run.
    pub fn success(summary: &RunSummary) -> Self {
        Self {
            status_code: 200,
            body: json!({
                "status": "success",
                "environment": summary.environment,
                "updates_found": summary.updates_found(),
                "pdfs_analyzed": summary.bulletins_found,
                "new_bulletins": summary.new_bulletins,
                "documents_processed": summary.documents_processed,
                "documents_failed": summary.documents_failed,
                "skipped_for_deadline": summary.skipped_for_deadline,
                "email_sent": summary.email_sent,
                "updates": summary.updates,
                "execution_time": summary.execution_time,
            }),
        }
    }

    /// 500 response; internal error details are not exposed.
    pub fn failure(error: &AppError) -> Self {
        let message = if error.is_domain_error() {
            error.to_string()
        } else {
            "Internal server error".to_string()
        };
        Self {
            status_code: 500,
            body: json!({ "status": "error", "message": message }),
        }
    }
}
