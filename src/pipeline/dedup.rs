// src/pipeline/dedup.rs

//! Processed-document tracking.
//!
//! Each processed document URL leaves a small marker object under
//! `processed/`. A bulletin is new exactly when its marker is missing.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::Result;
use crate::models::Bulletin;
use crate::storage::{ObjectStore, keys};

/// Outcome of filtering a listing against the stored markers.
#[derive(Debug, Default)]
pub struct DedupOutcome {
    /// Bulletins without a marker, in listing order
    pub new: Vec<Bulletin>,
    pub already_processed: usize,
    /// Bulletins whose marker could not be checked; retried next run
    pub check_failures: usize,
}

/// Marker-based deduplicator.
pub struct Deduplicator<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> Deduplicator<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Whether a document URL has a processed marker.
    pub async fn is_processed(&self, url: &str) -> Result<bool> {
        self.store.exists(&keys::processed_marker(url)).await
    }

    /// Write the processed marker for a URL.
    ///
    /// Failures are logged only; the document is then simply processed again
    /// on the next run.
    pub async fn mark_processed(&self, url: &str, at: DateTime<Utc>) {
        let key = keys::processed_marker(url);
        let body = format!("Procesado: {}\nURL: {}", at.to_rfc3339(), url);

        if let Err(e) = self.store.put(&key, body.into_bytes(), "text/plain").await {
            warn!(url, error = %e, "Failed to write processed marker");
        }
    }

    /// Keep only bulletins that have not been processed yet.
    pub async fn filter_new(&self, bulletins: Vec<Bulletin>) -> DedupOutcome {
        let mut outcome = DedupOutcome::default();

        for bulletin in bulletins {
            match self.is_processed(&bulletin.link).await {
                Ok(true) => {
                    info!(url = %bulletin.link, "Already processed");
                    outcome.already_processed += 1;
                }
                Ok(false) => outcome.new.push(bulletin),
                Err(e) => {
                    warn!(url = %bulletin.link, error = %e, "Could not check processed marker");
                    outcome.check_failures += 1;
                }
            }
        }

        outcome
    }

    /// Number of processed markers in storage.
    pub async fn processed_count(&self) -> Result<usize> {
        Ok(self.store.list(keys::PROCESSED_PREFIX).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::error::AppError;
    use crate::storage::LocalStorage;

    /// Local store whose marker lookups fail for one URL.
    struct FlakyStore {
        inner: LocalStorage,
        failing_key: String,
    }

    #[async_trait]
    impl ObjectStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
            self.inner.put(key, bytes, content_type).await
        }

        async fn exists(&self, key: &str) -> Result<bool> {
            if key == self.failing_key {
                return Err(AppError::storage("access denied"));
            }
            self.inner.exists(key).await
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key).await
        }

        async fn list(&self, prefix: &str) -> Result<Vec<String>> {
            self.inner.list(prefix).await
        }

        fn location(&self, key: &str) -> String {
            self.inner.location(key)
        }
    }

    fn bulletin(name: &str) -> Bulletin {
        Bulletin {
            title: name.to_string(),
            date: None,
            link: format!("https://example.com/{name}.pdf"),
        }
    }

    #[tokio::test]
    async fn test_mark_then_detect() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let dedup = Deduplicator::new(&storage);

        let url = "https://example.com/a.pdf";
        assert!(!dedup.is_processed(url).await.unwrap());

        dedup.mark_processed(url, Utc::now()).await;
        assert!(dedup.is_processed(url).await.unwrap());

        let marker = storage.get(&keys::processed_marker(url)).await.unwrap().unwrap();
        let marker = String::from_utf8(marker).unwrap();
        assert!(marker.starts_with("Procesado: "));
        assert!(marker.ends_with("URL: https://example.com/a.pdf"));
    }

    #[tokio::test]
    async fn test_filter_new_keeps_order() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let dedup = Deduplicator::new(&storage);

        dedup.mark_processed(&bulletin("b").link, Utc::now()).await;

        let outcome = dedup
            .filter_new(vec![bulletin("c"), bulletin("b"), bulletin("a")])
            .await;

        let titles: Vec<&str> = outcome.new.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "a"]);
        assert_eq!(outcome.already_processed, 1);
        assert_eq!(outcome.check_failures, 0);
        assert_eq!(dedup.processed_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_filter_new_counts_check_failures() {
        let tmp = TempDir::new().unwrap();
        let storage = FlakyStore {
            inner: LocalStorage::new(tmp.path()),
            failing_key: keys::processed_marker(&bulletin("b").link),
        };
        let dedup = Deduplicator::new(&storage);

        dedup.mark_processed(&bulletin("c").link, Utc::now()).await;

        let outcome = dedup
            .filter_new(vec![bulletin("a"), bulletin("b"), bulletin("c")])
            .await;

        let titles: Vec<&str> = outcome.new.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["a"]);
        assert_eq!(outcome.already_processed, 1);
        assert_eq!(outcome.check_failures, 1);
    }
}
