//! Monitoring pipeline.
//!
//! - `dedup`: processed markers per document URL
//! - `diff` / `guard`: listing comparison with the previous run
//! - `monitor`: one full run; `run_once` and `run_from_config` also write the run log
//! - `report`: text run logs under `logs/`

pub mod dedup;
pub mod diff;
pub mod guard;
pub mod monitor;
pub mod report;

pub use dedup::{DedupOutcome, Deduplicator};
pub use diff::{ListingDiff, ListingSnapshot, diff_listing};
pub use guard::{GuardResult, ListingGuard};
pub use monitor::{Monitor, record_failure, run_from_config, run_once};
pub use report::{ReportKind, RunReport};
