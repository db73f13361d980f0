//! URL normalization for visited-set membership.
//!
//! Every membership test and insertion must go through [`normalize_url`] so
//! the dedup set sees one spelling per page: origin + path with the trailing
//! slash stripped (except root), query string retained, fragment dropped.

use url::Url;

/// Normalize a URL for dedup purposes.
///
/// On parse failure, falls back to stripping only the fragment and any
/// trailing slashes from the raw string.
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => {
            let mut path = url.path().to_string();
            if path.len() > 1 && path.ends_with('/') {
                path.pop();
            }
            let origin = url.origin().ascii_serialization();
            match url.query() {
                Some(query) => format!("{origin}{path}?{query}"),
                None => format!("{origin}{path}"),
            }
        }
        Err(_) => {
            let without_fragment = match raw.find('#') {
                Some(idx) => &raw[..idx],
                None => raw,
            };
            without_fragment.trim_end_matches('/').to_string()
        }
    }
}
