// src/services/mod.rs

//! Service layer for the monitor.
//!
//! - `ListingScraper`: Extracts bulletin links from listing pages
//! - `TextExtractor` / `match_keywords`: Document analysis
//! - `Notifier`: Email composition and delivery

pub mod analyzer;
pub mod notifier;
pub mod scraper;
#[cfg(feature = "ses")]
pub mod ses;

pub use analyzer::{PdfTextExtractor, TextExtractor, match_keywords};
pub use notifier::{LogNotifier, Notifier, PdfAttachment, SmtpNotifier, compose, notifier_from_config};
pub use scraper::ListingScraper;
#[cfg(feature = "ses")]
pub use ses::SesNotifier;
