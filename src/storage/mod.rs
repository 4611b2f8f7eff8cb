//! Object storage abstractions.
//!
//! The monitor owns a single bucket and only ever needs put/get/delete/list
//! on its objects. Everything it persists lives under four prefixes:
//!
//! ```text
//! {bucket}/
//! ├── processed/{md5(url)}.txt      # Seen markers, one per document URL
//! ├── boletines/YYYYMMDD/{name}.pdf # Raw documents, by processing day
//! ├── state/listing.json            # Last scraped listing
//! └── logs/{kind}_{timestamp}.txt   # One text log per run
//! ```

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::Result;

// Re-export for convenience
pub use local::LocalStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;

/// Minimal object store interface over a single bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an object, returning `None` if it does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Create or overwrite an object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// List object keys under a prefix, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Human-readable location of a key, for logs.
    fn location(&self, key: &str) -> String;
}

/// Read and deserialize a JSON object.
pub async fn read_json<T: DeserializeOwned>(
    store: &dyn ObjectStore,
    key: &str,
) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Serialize and write a JSON object.
pub async fn write_json<T: Serialize + ?Sized>(
    store: &dyn ObjectStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    store.put(key, bytes, "application/json").await
}

/// Object key layout.
pub mod keys {
    use chrono::{DateTime, Utc};

    use crate::utils::url_hash;

    pub const PROCESSED_PREFIX: &str = "processed/";
    pub const BULLETINS_PREFIX: &str = "boletines/";
    pub const LOGS_PREFIX: &str = "logs/";
    pub const LISTING_SNAPSHOT: &str = "state/listing.json";

    /// Marker recording that a document URL has been processed.
    pub fn processed_marker(url: &str) -> String {
        format!("{}{}.txt", PROCESSED_PREFIX, url_hash(url))
    }

    /// Archive location of a downloaded document.
    pub fn bulletin_artifact(at: DateTime<Utc>, file_name: &str) -> String {
        format!("{}{}/{}", BULLETINS_PREFIX, at.format("%Y%m%d"), file_name)
    }

    /// Run log location.
    pub fn run_log(kind: &str, at: DateTime<Utc>) -> String {
        format!("{}{}_{}.txt", LOGS_PREFIX, kind, at.format("%Y%m%d_%H%M%S"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use super::keys;

    #[test]
    fn test_key_layout() {
        let at = Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(
            keys::bulletin_artifact(at, "BT_07.pdf"),
            "boletines/20250307/BT_07.pdf"
        );
        assert_eq!(keys::run_log("success", at), "logs/success_20250307_090501.txt");

        assert_eq!(
            keys::processed_marker("http://omawww.sat.gob.mx/x/BT_01.pdf"),
            "processed/f4a5150edbbc9dff486f6953d31aa42b.txt"
        );
    }
}
