//! Utility functions and helpers.

pub mod http;

use md5::{Digest, Md5};
use url::Url;

/// Fallback file name for links without a usable path segment.
pub const DEFAULT_FILE_NAME: &str = "documento.pdf";

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Last path segment of a URL, ignoring query and fragment.
pub fn file_name_from_url(url_str: &str) -> String {
    let name = match Url::parse(url_str) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
            .unwrap_or_default(),
        Err(_) => url_str
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .unwrap_or_default()
            .to_string(),
    };

    if name.is_empty() {
        DEFAULT_FILE_NAME.to_string()
    } else {
        name
    }
}

/// Hex MD5 of a URL, used for processed-marker keys.
///
/// Markers already in the bucket use this digest, so it must not change.
pub fn url_hash(url: &str) -> String {
    hex::encode(Md5::digest(url.as_bytes()))
}

/// Collapse runs of whitespace into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
