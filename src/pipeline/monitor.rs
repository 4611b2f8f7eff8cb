// src/pipeline/monitor.rs

//! Monitoring run orchestration.
//!
//! One run scrapes the listing, filters out processed documents, downloads
//! and analyzes the rest, archives them, and emails the keyword matches.
//! Documents are independent: a failing download never fails the run, it is
//! simply retried next time because no marker was written for it.

use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{error, info, instrument, warn};

use crate::error::{AppError, Result};
use crate::models::{Bulletin, BulletinUpdate, Config, RunSummary};
use crate::pipeline::dedup::Deduplicator;
use crate::pipeline::diff::{ListingSnapshot, diff_listing};
use crate::pipeline::guard::ListingGuard;
use crate::pipeline::report::RunReport;
use crate::services::{
    ListingScraper, Notifier, PdfAttachment, TextExtractor, compose, match_keywords,
    notifier_from_config,
};
use crate::storage::{ObjectStore, keys, read_json, write_json};
use crate::utils::http::{Fetch, HttpFetcher};

/// Result of processing one document.
#[derive(Debug)]
enum DocumentOutcome {
    /// Archived; `bytes` kept only for matches that may be attached
    Processed {
        bulletin: Bulletin,
        update: Option<BulletinUpdate>,
        bytes: Option<Vec<u8>>,
    },
    /// No text could be extracted; left unmarked
    EmptyText,
    Failed,
    SkippedForDeadline,
}

/// Orchestrates a single monitoring run.
pub struct Monitor<'a> {
    config: &'a Config,
    store: &'a dyn ObjectStore,
    fetcher: &'a dyn Fetch,
    extractor: &'a dyn TextExtractor,
    notifier: &'a dyn Notifier,
}

impl<'a> Monitor<'a> {
    pub fn new(
        config: &'a Config,
        store: &'a dyn ObjectStore,
        fetcher: &'a dyn Fetch,
        extractor: &'a dyn TextExtractor,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            config,
            store,
            fetcher,
            extractor,
            notifier,
        }
    }

    /// Run the pipeline once.
    ///
    /// `deadline` is the instant the host platform will kill the process;
    /// no new download starts within `limits.deadline_margin_secs` of it.
    #[instrument(level = "info", skip_all, fields(environment = %self.config.environment))]
    pub async fn run(&self, deadline: Option<Instant>) -> Result<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary {
            environment: self.config.environment.clone(),
            ..RunSummary::default()
        };

        // Step 1: Scrape and compare with the previous listing
        let scraper = ListingScraper::new(&self.config.source)?;
        let bulletins = scraper.scrape(self.fetcher).await?;
        summary.bulletins_found = bulletins.len();

        let previous = self.load_snapshot().await;
        let previous_bulletins = previous.map(|s| s.bulletins).unwrap_or_default();

        ListingGuard::new(self.config.guard.clone()).validate(&bulletins, &previous_bulletins)?;

        let diff = diff_listing(&previous_bulletins, &bulletins);
        summary.listing_added = diff.added.len();
        summary.listing_removed = diff.removed.len();
        if diff.has_changes() {
            info!(
                added = diff.added.len(),
                retitled = diff.retitled.len(),
                removed = diff.removed.len(),
                "Listing changed since last run"
            );
        }

        write_json(
            self.store,
            keys::LISTING_SNAPSHOT,
            &ListingSnapshot::new(bulletins.clone()),
        )
        .await?;

        // Step 2: Drop documents that were already processed
        let dedup = Deduplicator::new(self.store);
        let candidates: Vec<Bulletin> = bulletins
            .into_iter()
            .take(self.config.limits.max_documents)
            .collect();
        let dedup_outcome = dedup.filter_new(candidates).await;
        summary.new_bulletins = dedup_outcome.new.len();
        summary.documents_failed += dedup_outcome.check_failures;

        info!(
            new = dedup_outcome.new.len(),
            already_processed = dedup_outcome.already_processed,
            "Documents to process"
        );

        // Step 3: Download, analyze and archive
        let concurrency = self.config.http.max_concurrent.max(1);
        let outcomes: Vec<DocumentOutcome> = stream::iter(dedup_outcome.new)
            .map(|bulletin| async move {
                if self.near_deadline(deadline) {
                    return DocumentOutcome::SkippedForDeadline;
                }
                self.process_document(bulletin).await
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut matched = Vec::new();
        let mut attachments = Vec::new();
        for outcome in outcomes {
            match outcome {
                DocumentOutcome::Processed {
                    bulletin,
                    update,
                    bytes,
                } => {
                    summary.documents_processed += 1;
                    match update {
                        Some(update) => {
                            if let Some(bytes) = bytes {
                                attachments.push(PdfAttachment {
                                    file_name: update.pdf.clone(),
                                    bytes,
                                });
                            }
                            matched.push(bulletin);
                            summary.updates.push(update);
                        }
                        None => dedup.mark_processed(&bulletin.link, Utc::now()).await,
                    }
                }
                DocumentOutcome::EmptyText => summary.documents_failed += 1,
                DocumentOutcome::Failed => summary.documents_failed += 1,
                DocumentOutcome::SkippedForDeadline => summary.skipped_for_deadline += 1,
            }
        }

        if summary.skipped_for_deadline > 0 {
            warn!(
                skipped = summary.skipped_for_deadline,
                "Deadline near, remaining documents left for the next run"
            );
        }

        // Step 4: Notify, then mark the matched documents
        if summary.updates.is_empty() {
            info!("No updates to send");
        } else {
            let attachments = self.within_budget(attachments);
            let message = compose(&self.config.email, &summary.updates, &attachments)?;
            self.notifier.send(&message).await?;
            summary.email_sent = true;
            info!(
                updates = summary.updates.len(),
                attachments = attachments.len(),
                transport = self.notifier.name(),
                "Email sent"
            );

            for bulletin in &matched {
                dedup.mark_processed(&bulletin.link, Utc::now()).await;
            }
        }

        summary.execution_time = started.elapsed().as_secs_f64();
        Ok(summary)
    }

    /// Download, analyze and archive one document.
    async fn process_document(&self, bulletin: Bulletin) -> DocumentOutcome {
        let name = bulletin.file_name();

        let bytes = match self.fetcher.fetch_bytes(&bulletin.link).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(url = %bulletin.link, error = %e, "Failed to download document");
                return DocumentOutcome::Failed;
            }
        };

        let text = self.extractor.extract_text(&name, bytes.clone()).await;
        if text.trim().is_empty() {
            warn!(document = %name, "No text extracted, will retry next run");
            return DocumentOutcome::EmptyText;
        }

        let keywords = match_keywords(&text, &self.config.keywords);
        let processed_at = Utc::now();

        let key = keys::bulletin_artifact(processed_at, &name);
        if let Err(e) = self
            .store
            .put(&key, bytes.clone(), "application/pdf")
            .await
        {
            error!(document = %name, error = %e, "Failed to archive document");
            return DocumentOutcome::Failed;
        }
        info!(document = %name, location = %self.store.location(&key), "Archived document");

        if keywords.is_empty() {
            return DocumentOutcome::Processed {
                bulletin,
                update: None,
                bytes: None,
            };
        }

        info!(document = %name, keywords = ?keywords, "Keywords found");
        let update = BulletinUpdate {
            pdf: name,
            keywords,
            url: bulletin.link.clone(),
            processed_at,
        };
        let bytes = self.config.email.attach_documents.then_some(bytes);

        DocumentOutcome::Processed {
            bulletin,
            update: Some(update),
            bytes,
        }
    }

    fn near_deadline(&self, deadline: Option<Instant>) -> bool {
        let margin = Duration::from_secs(self.config.limits.deadline_margin_secs);
        deadline.is_some_and(|d| Instant::now() + margin >= d)
    }

    /// Keep attachments in order until the byte budget is spent.
    fn within_budget(&self, attachments: Vec<PdfAttachment>) -> Vec<PdfAttachment> {
        let budget = self.config.email.max_attachment_bytes;
        let mut used = 0;
        let mut kept = Vec::new();

        for attachment in attachments {
            if used + attachment.bytes.len() > budget {
                warn!(
                    document = %attachment.file_name,
                    size = attachment.bytes.len(),
                    "Attachment budget exceeded, sending link only"
                );
                continue;
            }
            used += attachment.bytes.len();
            kept.push(attachment);
        }

        kept
    }

    async fn load_snapshot(&self) -> Option<ListingSnapshot> {
        match read_json(self.store, keys::LISTING_SNAPSHOT).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable listing snapshot");
                None
            }
        }
    }
}

/// Run the monitor once and persist the run log.
///
/// The success or error log is written whatever the outcome; the error itself
/// is still returned so the caller can report it.
pub async fn run_once(
    config: &Config,
    store: &dyn ObjectStore,
    fetcher: &dyn Fetch,
    extractor: &dyn TextExtractor,
    notifier: &dyn Notifier,
    deadline: Option<Instant>,
) -> Result<RunSummary> {
    info!("Starting bulletin monitoring");

    let result = match config.validate() {
        Ok(()) => {
            Monitor::new(config, store, fetcher, extractor, notifier)
                .run(deadline)
                .await
        }
        Err(e) => Err(e),
    };

    match &result {
        Ok(summary) => {
            let report = RunReport::success(summary, Utc::now());
            info!("{}", report.body);
            report.save(store).await;
        }
        Err(e) => record_failure(store, e).await,
    }

    result
}

/// Build the HTTP fetcher and notifier from `config`, then [`run_once`].
///
/// A setup failure leaves an error log just like a failed run.
pub async fn run_from_config(
    config: &Config,
    store: &dyn ObjectStore,
    extractor: &dyn TextExtractor,
    deadline: Option<Instant>,
) -> Result<RunSummary> {
    let (fetcher, notifier) = match setup(config).await {
        Ok(parts) => parts,
        Err(e) => {
            record_failure(store, &e).await;
            return Err(e);
        }
    };

    run_once(
        config,
        store,
        &fetcher,
        extractor,
        notifier.as_ref(),
        deadline,
    )
    .await
}

async fn setup(config: &Config) -> Result<(HttpFetcher, Box<dyn Notifier>)> {
    let fetcher = HttpFetcher::from_config(&config.http)?;
    let notifier = notifier_from_config(config).await?;
    Ok((fetcher, notifier))
}

/// Write the error log for a failed run.
///
/// Callers report the failure itself; the Lambda handler emits the one
/// `Monitoring run failed` line the error metric counts.
pub async fn record_failure(store: &dyn ObjectStore, err: &AppError) {
    let report = RunReport::failure(err, Utc::now());
    warn!("{}", report.body);
    report.save(store).await;
}
