//! Listing diff between consecutive runs.
//!
//! The last scraped listing is kept in `state/listing.json`. Comparing it with
//! the fresh scrape tells which links appeared, disappeared or were retitled
//! since the previous run.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Bulletin;

/// Listing as persisted after each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSnapshot {
    /// ISO 8601 timestamp of the scrape
    pub updated_at: DateTime<Utc>,
    /// Bulletin count
    pub count: usize,
    /// Bulletins in listing order
    pub bulletins: Vec<Bulletin>,
}

impl ListingSnapshot {
    pub fn new(bulletins: Vec<Bulletin>) -> Self {
        Self {
            updated_at: Utc::now(),
            count: bulletins.len(),
            bulletins,
        }
    }
}

/// Changes between two listings, keyed by link.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListingDiff {
    /// Bulletins present now but not before, in listing order
    pub added: Vec<Bulletin>,
    /// Bulletins whose title changed for the same link
    pub retitled: Vec<Bulletin>,
    /// Links present before but not now
    pub removed: Vec<String>,
}

impl ListingDiff {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.retitled.is_empty() || !self.removed.is_empty()
    }
}

/// Calculate the diff between the previous and current listings.
pub fn diff_listing(previous: &[Bulletin], current: &[Bulletin]) -> ListingDiff {
    let prev_map: HashMap<&str, &Bulletin> =
        previous.iter().map(|b| (b.link.as_str(), b)).collect();
    let curr_links: HashSet<&str> = current.iter().map(|b| b.link.as_str()).collect();

    let mut diff = ListingDiff::default();

    for bulletin in current {
        match prev_map.get(bulletin.link.as_str()) {
            None => diff.added.push(bulletin.clone()),
            Some(prev) if prev.title != bulletin.title => diff.retitled.push(bulletin.clone()),
            Some(_) => {}
        }
    }

    diff.removed = previous
        .iter()
        .filter(|b| !curr_links.contains(b.link.as_str()))
        .map(|b| b.link.clone())
        .collect();

    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bulletin(id: &str, title: &str) -> Bulletin {
        Bulletin {
            title: title.to_string(),
            date: None,
            link: format!("https://example.com/{}.pdf", id),
        }
    }

    #[test]
    fn test_no_changes() {
        let prev = vec![make_bulletin("001", "Title 1"), make_bulletin("002", "Title 2")];
        let curr = prev.clone();

        let result = diff_listing(&prev, &curr);
        assert!(!result.has_changes());
    }

    #[test]
    fn test_additions_keep_listing_order() {
        let prev = vec![make_bulletin("001", "Title 1")];
        let curr = vec![
            make_bulletin("003", "Title 3"),
            make_bulletin("001", "Title 1"),
            make_bulletin("002", "Title 2"),
        ];

        let result = diff_listing(&prev, &curr);
        let added: Vec<&str> = result.added.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(added, vec!["Title 3", "Title 2"]);
    }

    #[test]
    fn test_mixed_changes() {
        let prev = vec![
            make_bulletin("001", "Keep"),
            make_bulletin("002", "Retitle Me"),
            make_bulletin("003", "Remove Me"),
        ];
        let curr = vec![
            make_bulletin("001", "Keep"),
            make_bulletin("002", "Retitled"),
            make_bulletin("004", "New Bulletin"),
        ];

        let result = diff_listing(&prev, &curr);
        assert_eq!(result.added.len(), 1);
        assert_eq!(result.added[0].title, "New Bulletin");
        assert_eq!(result.retitled[0].title, "Retitled");
        assert_eq!(result.removed, vec!["https://example.com/003.pdf"]);
    }

    #[test]
    fn test_empty_to_full() {
        let curr = vec![make_bulletin("001", "First")];
        let result = diff_listing(&[], &curr);
        assert_eq!(result.added.len(), 1);
        assert!(result.removed.is_empty());
    }

    #[test]
    fn test_snapshot_counts() {
        let snapshot = ListingSnapshot::new(vec![make_bulletin("001", "a")]);
        assert_eq!(snapshot.count, 1);
    }
}
