// src/lambda/mod.rs

//! AWS Lambda handler for the bulletin monitor.
//!
//! Each scheduled invocation:
//! 1. Reads configuration from the function environment
//! 2. Scrapes the listing and processes new documents
//! 3. Archives documents and run logs in the bucket
//! 4. Emails keyword matches
//!
//! The handler never returns `Err`, so the platform `Errors` metric stays at
//! zero. Failures become a 500 invocation result plus one `Monitoring run
//! failed` error line; [`crate::deploy::RUN_FAILED_FILTER`] counts that line
//! for the alarm.
//! Once the bucket is reachable every failure also leaves a `logs/error_*`
//! object.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::error::Result;
use crate::models::{Config, InvocationResult, RunSummary};
use crate::pipeline::{record_failure, run_from_config};
use crate::services::PdfTextExtractor;
use crate::storage::S3Storage;

/// Main Lambda handler function.
///
/// The scheduler sends no meaningful payload; it is ignored.
#[instrument(skip_all, fields(request_id = %event.context.request_id))]
pub async fn handler(
    event: LambdaEvent<Value>,
) -> std::result::Result<InvocationResult, LambdaError> {
    let deadline = deadline_from_epoch_ms(event.context.deadline);

    let result = match run(deadline).await {
        Ok(summary) => {
            info!(
                updates = summary.updates_found(),
                pdfs = summary.bulletins_found,
                execution_time = summary.execution_time,
                "Monitoring completed"
            );
            InvocationResult::success(&summary)
        }
        Err(e) => {
            error!(error = %e, "Monitoring run failed");
            InvocationResult::failure(&e)
        }
    };

    Ok(result)
}

/// Build every dependency from the environment and run once.
///
/// The bucket is opened first so that later setup failures still leave an
/// error log in it.
async fn run(deadline: Option<Instant>) -> Result<RunSummary> {
    let config = Config::from_env()?;
    let storage = S3Storage::from_config(&config.storage).await?;

    info!(
        environment = %config.environment,
        bucket = %config.storage.bucket,
        localstack = config.storage.use_localstack,
        "Configuration loaded"
    );

    if let Err(e) = config.require_environment() {
        record_failure(&storage, &e).await;
        return Err(e);
    }

    run_from_config(&config, &storage, &PdfTextExtractor, deadline).await
}

/// Convert the invocation deadline (Unix epoch milliseconds) to an `Instant`.
fn deadline_from_epoch_ms(deadline_ms: u64) -> Option<Instant> {
    if deadline_ms == 0 {
        return None;
    }
    let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_millis() as u64;
    let remaining = Duration::from_millis(deadline_ms.saturating_sub(now_ms));
    Some(Instant::now() + remaining)
}
