//! Document text extraction and keyword matching.

use async_trait::async_trait;
use tracing::warn;

use crate::utils::normalize_whitespace;

/// Turns a downloaded document into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract the text of a document.
    ///
    /// Unreadable documents yield an empty string; `name` is only used for logging.
    async fn extract_text(&self, name: &str, bytes: Vec<u8>) -> String;
}

/// PDF extractor backed by `pdf-extract`, run on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract_text(&self, name: &str, bytes: Vec<u8>) -> String {
        let result =
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await;

        match result {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(document = name, error = %e, "Failed to extract PDF text");
                String::new()
            }
            // pdf-extract panics on some malformed documents
            Err(e) => {
                warn!(document = name, error = %e, "PDF text extraction aborted");
                String::new()
            }
        }
    }
}

/// Return the keywords found in `text`, in the order they were configured.
///
/// Matching is case-insensitive and insensitive to line breaks and repeated
/// spaces, which PDF extraction tends to introduce inside phrases.
pub fn match_keywords(text: &str, keywords: &[String]) -> Vec<String> {
    let haystack = normalize_whitespace(text).to_lowercase();

    keywords
        .iter()
        .filter(|keyword| {
            let needle = normalize_whitespace(keyword).to_lowercase();
            !needle.is_empty() && haystack.contains(&needle)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords() -> Vec<String> {
        vec![
            "CFDI 4.0".to_string(),
            "Anexo 20".to_string(),
            "contabilidad electrónica".to_string(),
            "e.firma".to_string(),
        ]
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let found = match_keywords("Cambios al ANEXO 20 y al cfdi 4.0", &keywords());
        assert_eq!(found, vec!["CFDI 4.0", "Anexo 20"]);
    }

    #[test]
    fn test_match_across_line_breaks() {
        let found = match_keywords("la Contabilidad\nElectrónica  del ejercicio", &keywords());
        assert_eq!(found, vec!["contabilidad electrónica"]);
    }

    #[test]
    fn test_no_match() {
        assert!(match_keywords("Aviso de mantenimiento", &keywords()).is_empty());
        assert!(match_keywords("", &keywords()).is_empty());
    }

    #[test]
    fn test_blank_keywords_never_match() {
        let found = match_keywords("anything", &["  ".to_string()]);
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_pdf_yields_empty_text() {
        let text = PdfTextExtractor
            .extract_text("broken.pdf", b"not a pdf at all".to_vec())
            .await;
        assert!(text.is_empty());
    }
}
