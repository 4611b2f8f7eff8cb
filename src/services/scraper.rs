// src/services/scraper.rs

//! Bulletin listing scraper.
//!
//! Fetches the configured listing pages and extracts every anchor whose
//! target is a bulletin document.

use std::collections::HashSet;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Bulletin, SourceConfig};
use crate::utils::http::Fetch;
use crate::utils::{normalize_whitespace, resolve_url};

/// Date formats printed next to bulletin links.
const DATE_PATTERN: &str = r"(?i)\b(\d{1,2}/\d{1,2}/\d{4}|\d{4}-\d{2}-\d{2}|\d{1,2}\s+de\s+(?:enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|octubre|noviembre|diciembre)\s+(?:de\s+|del\s+)?\d{4})\b";

/// Service for extracting bulletins from listing pages.
pub struct ListingScraper {
    urls: Vec<String>,
    link_selector: Selector,
    document_suffix: String,
    date_pattern: Regex,
}

impl ListingScraper {
    /// Create a scraper for the configured listing pages.
    pub fn new(source: &SourceConfig) -> Result<Self> {
        let link_selector = Selector::parse(&source.link_selector)
            .map_err(|e| AppError::selector(&source.link_selector, format!("{e:?}")))?;
        let date_pattern = Regex::new(DATE_PATTERN)
            .map_err(|e| AppError::config(format!("invalid date pattern: {e}")))?;

        Ok(Self {
            urls: source.urls.clone(),
            link_selector,
            document_suffix: source.document_suffix.to_lowercase(),
            date_pattern,
        })
    }

    /// Fetch every listing page and return the bulletins in page order.
    ///
    /// Any page failing to download fails the whole scrape.
    #[instrument(level = "info", skip_all)]
    pub async fn scrape(&self, fetcher: &dyn Fetch) -> Result<Vec<Bulletin>> {
        let mut seen = HashSet::new();
        let mut bulletins = Vec::new();

        for url in &self.urls {
            let html = fetcher.fetch_text(url).await?;
            let parsed = self.parse_listing(&html, url)?;
            info!(url = %url, count = parsed.len(), "Parsed listing page");

            for bulletin in parsed {
                if seen.insert(bulletin.link.clone()) {
                    bulletins.push(bulletin);
                }
            }
        }

        info!(count = bulletins.len(), "Found bulletin documents");
        Ok(bulletins)
    }

    /// Extract bulletins from a single listing page.
    ///
    /// Relative links are resolved against `page_url`; repeated links keep
    /// their first occurrence.
    pub fn parse_listing(&self, html: &str, page_url: &str) -> Result<Vec<Bulletin>> {
        let base_url =
            Url::parse(page_url).map_err(|e| AppError::scrape(page_url, format!("bad URL: {e}")))?;
        let document = Html::parse_document(html);

        let mut seen = HashSet::new();
        let mut bulletins = Vec::new();

        for anchor in document.select(&self.link_selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !self.is_document_link(href) {
                continue;
            }

            let link = resolve_url(&base_url, href.trim());
            if !seen.insert(link.clone()) {
                debug!(%link, "Skipping repeated link");
                continue;
            }

            let title = normalize_whitespace(&anchor.text().collect::<String>());
            let date = self.find_date(&anchor);
            let mut bulletin = Bulletin { title, date, link };
            if bulletin.title.is_empty() {
                bulletin.title = bulletin.file_name();
            }
            bulletins.push(bulletin);
        }

        Ok(bulletins)
    }

    /// Whether an href points at a bulletin document (query and fragment ignored).
    fn is_document_link(&self, href: &str) -> bool {
        let path = href.split(['?', '#']).next().unwrap_or_default();
        path.trim().to_lowercase().ends_with(&self.document_suffix)
    }

    /// Look for a date in the anchor text, then in its parent element.
    fn find_date(&self, anchor: &ElementRef<'_>) -> Option<String> {
        let own_text: String = anchor.text().collect();
        if let Some(found) = self.date_pattern.find(&own_text) {
            return Some(normalize_whitespace(found.as_str()));
        }

        let parent = anchor.parent().and_then(ElementRef::wrap)?;
        let parent_text: String = parent.text().collect();
        self.date_pattern
            .find(&parent_text)
            .map(|m| normalize_whitespace(m.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;

    const PAGE_URL: &str =
        "http://omawww.sat.gob.mx/sala_prensa/boletin_tecnico/Paginas/default.aspx";

    const LISTING: &str = r#"
        <html><body>
          <ul class="boletines">
            <li><span>15/01/2025</span> <a href="../Documents/BT_01_2025.pdf">Boletín Técnico 01</a></li>
            <li><a href="/docs/BT_02_2025.PDF?v=3">Boletín
                 Técnico 02</a> publicado el 3 de febrero de 2025</li>
            <li><a href="https://cdn.example.com/BT_03_2025.pdf"></a></li>
            <li><a href="../Documents/BT_01_2025.pdf">Duplicado</a></li>
            <li><a href="contacto.aspx">Contacto</a></li>
            <li><a>Sin enlace</a></li>
          </ul>
        </body></html>
    "#;

    fn scraper() -> ListingScraper {
        ListingScraper::new(&SourceConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_listing_extracts_documents() {
        let bulletins = scraper().parse_listing(LISTING, PAGE_URL).unwrap();
        let links: Vec<&str> = bulletins.iter().map(|b| b.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "http://omawww.sat.gob.mx/sala_prensa/boletin_tecnico/Documents/BT_01_2025.pdf",
                "http://omawww.sat.gob.mx/docs/BT_02_2025.PDF?v=3",
                "https://cdn.example.com/BT_03_2025.pdf",
            ]
        );
    }

    #[test]
    fn test_parse_listing_titles_and_dates() {
        let bulletins = scraper().parse_listing(LISTING, PAGE_URL).unwrap();

        assert_eq!(bulletins[0].title, "Boletín Técnico 01");
        assert_eq!(bulletins[0].date.as_deref(), Some("15/01/2025"));

        assert_eq!(bulletins[1].title, "Boletín Técnico 02");
        assert_eq!(bulletins[1].date.as_deref(), Some("3 de febrero de 2025"));

        // Empty anchor text falls back to the file name
        assert_eq!(bulletins[2].title, "BT_03_2025.pdf");
        assert_eq!(bulletins[2].date, None);
    }

    #[test]
    fn test_parse_listing_without_documents() {
        let bulletins = scraper()
            .parse_listing("<html><a href='x.aspx'>x</a></html>", PAGE_URL)
            .unwrap();
        assert!(bulletins.is_empty());
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let source = SourceConfig {
            link_selector: "[[invalid".to_string(),
            ..SourceConfig::default()
        };
        assert!(ListingScraper::new(&source).is_err());
    }

    #[test]
    fn test_custom_selector_narrows_links() {
        let source = SourceConfig {
            link_selector: "li span + a[href]".to_string(),
            ..SourceConfig::default()
        };
        let bulletins = ListingScraper::new(&source)
            .unwrap()
            .parse_listing(LISTING, PAGE_URL)
            .unwrap();
        assert_eq!(bulletins.len(), 1);
        assert!(bulletins[0].link.ends_with("BT_01_2025.pdf"));
    }

    /// Serves fixed pages by URL.
    struct PageFetcher(HashMap<String, String>);

    #[async_trait]
    impl Fetch for PageFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| AppError::config(format!("no page for {url}")))
        }

        async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
            Err(AppError::config(format!("no document for {url}")))
        }
    }

    #[tokio::test]
    async fn test_scrape_merges_pages_in_order() {
        let second_url = "http://omawww.sat.gob.mx/sala_prensa/boletin_tecnico/Paginas/2024.aspx";
        let second = r#"
            <ul>
              <li><a href="../Documents/BT_01_2025.pdf">Repetido</a></li>
              <li><a href="../Documents/BT_12_2024.pdf">Boletín Técnico 12</a></li>
            </ul>
        "#;
        let fetcher = PageFetcher(HashMap::from([
            (PAGE_URL.to_string(), LISTING.to_string()),
            (second_url.to_string(), second.to_string()),
        ]));
        let source = SourceConfig {
            urls: vec![PAGE_URL.to_string(), second_url.to_string()],
            ..SourceConfig::default()
        };

        let bulletins = ListingScraper::new(&source)
            .unwrap()
            .scrape(&fetcher)
            .await
            .unwrap();

        let names: Vec<String> = bulletins.iter().map(|b| b.file_name()).collect();
        assert_eq!(
            names,
            vec!["BT_01_2025.pdf", "BT_02_2025.PDF", "BT_03_2025.pdf", "BT_12_2024.pdf"]
        );
        // The repeated link keeps its first page's title
        assert_eq!(bulletins[0].title, "Boletín Técnico 01");
    }

    #[tokio::test]
    async fn test_scrape_fails_when_a_page_fails() {
        let fetcher = PageFetcher(HashMap::from([(PAGE_URL.to_string(), LISTING.to_string())]));
        let source = SourceConfig {
            urls: vec![PAGE_URL.to_string(), "http://example.com/missing.aspx".to_string()],
            ..SourceConfig::default()
        };

        let result = ListingScraper::new(&source).unwrap().scrape(&fetcher).await;
        assert!(result.is_err());
    }
}
