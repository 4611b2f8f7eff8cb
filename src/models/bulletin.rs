//! Bulletin data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::file_name_from_url;

/// A bulletin entry parsed from a listing page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bulletin {
    /// Anchor text, or the document file name when the anchor is empty
    pub title: String,

    /// Publication date as printed next to the link, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// Absolute URL of the bulletin document
    pub link: String,
}

impl Bulletin {
    /// Document file name derived from the link.
    pub fn file_name(&self) -> String {
        file_name_from_url(&self.link)
    }
}

/// A newly processed document whose text matched at least one keyword.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulletinUpdate {
    /// Document file name
    pub pdf: String,

    /// Matched keywords, in configuration order
    pub keywords: Vec<String>,

    /// Document URL
    pub url: String,

    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        let bulletin = Bulletin {
            title: "Boletín 12".to_string(),
            date: None,
            link: "http://omawww.sat.gob.mx/boletin/Documents/BT_12_2024.pdf".to_string(),
        };
        assert_eq!(bulletin.file_name(), "BT_12_2024.pdf");
    }

    #[test]
    fn test_date_omitted_when_absent() {
        let bulletin = Bulletin {
            title: "t".to_string(),
            date: None,
            link: "https://example.com/a.pdf".to_string(),
        };
        let json = serde_json::to_string(&bulletin).unwrap();
        assert!(!json.contains("date"));
    }
}
