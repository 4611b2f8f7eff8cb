//! Listing drop guard.
//!
//! A listing page that suddenly yields far fewer links usually means the
//! page layout changed or an error page was served. The run is failed so the
//! error alarm fires, instead of silently reporting "no updates".

use crate::error::{AppError, Result};
use crate::models::{Bulletin, GuardConfig};

/// Result of a guard check.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardResult {
    /// Safe to proceed
    Safe {
        current_count: usize,
        previous_count: usize,
    },
    /// No usable previous listing
    ColdStart { current_count: usize },
    /// Listing shrank beyond the allowed drop
    Triggered {
        current_count: usize,
        previous_count: usize,
        drop_percent: f64,
    },
    /// Scrape found nothing although the previous listing had entries
    EmptyResult { previous_count: usize },
}

/// Guard comparing a fresh listing against the previous one.
#[derive(Debug, Clone)]
pub struct ListingGuard {
    config: GuardConfig,
}

impl ListingGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self { config }
    }

    /// Classify the fresh listing.
    pub fn check(&self, current: &[Bulletin], previous: &[Bulletin]) -> GuardResult {
        let current_count = current.len();
        let previous_count = previous.len();

        if current_count == 0 {
            if previous_count == 0 {
                return GuardResult::ColdStart { current_count };
            }
            return GuardResult::EmptyResult { previous_count };
        }

        if previous_count < self.config.min_baseline {
            return GuardResult::ColdStart { current_count };
        }

        if current_count < previous_count {
            let drop = previous_count - current_count;
            let drop_percent = (drop as f64 / previous_count as f64) * 100.0;

            if drop_percent > self.config.max_drop_percent as f64 {
                return GuardResult::Triggered {
                    current_count,
                    previous_count,
                    drop_percent,
                };
            }
        }

        GuardResult::Safe {
            current_count,
            previous_count,
        }
    }

    /// Return an error if the listing should not be trusted.
    pub fn validate(&self, current: &[Bulletin], previous: &[Bulletin]) -> Result<()> {
        match self.check(current, previous) {
            GuardResult::Safe { .. } | GuardResult::ColdStart { .. } => Ok(()),
            GuardResult::Triggered {
                current_count,
                previous_count,
                drop_percent,
            } => Err(AppError::Guard(format!(
                "listing dropped from {previous_count} to {current_count} entries ({drop_percent:.1}%)"
            ))),
            GuardResult::EmptyResult { previous_count } => Err(AppError::Guard(format!(
                "no bulletins found, previous listing had {previous_count}"
            ))),
        }
    }
}
