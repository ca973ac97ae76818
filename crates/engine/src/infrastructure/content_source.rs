//! URL content source.
//!
//! Fetches a web page and reduces it to plain text suitable for
//! summarization.

use std::sync::LazyLock;
use std::time::Duration;

use briefly_domain::{char_len, truncate_with_marker, TRUNCATION_MARKER};
use regex_lite::Regex;
use reqwest::Client;

/// HTML beyond this many characters is dropped before extraction.
pub const MAX_HTML_CHARS: usize = 500 * 1024;

/// Pages yielding less text than this are rejected.
pub const MIN_CONTENT_CHARS: usize = 100;

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid regex"));
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("valid regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Debug, thiserror::Error)]
pub enum ContentSourceError {
    #[error("Failed to fetch URL: {0}")]
    Request(String),

    #[error("Failed to fetch URL: {status} {reason}")]
    Status { status: u16, reason: String },

    #[error("Could not extract sufficient text content from URL")]
    InsufficientContent,
}

/// Fetches page text over HTTP.
#[derive(Clone)]
pub struct UrlContentSource {
    client: Client,
}

impl UrlContentSource {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    /// Downloads `url` (assuming `https://` when no scheme is given) and
    /// returns its visible text.
    pub async fn fetch_url_content(&self, url: &str) -> Result<String, ContentSourceError> {
        let url = normalize_url(url);
        tracing::info!(url = %url, "Fetching content");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ContentSourceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentSourceError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| ContentSourceError::Request(e.to_string()))?;

        let text = extract_text(&html)?;
        tracing::debug!(url = %url, text_chars = char_len(&text), "Extracted page text");
        Ok(text)
    }
}

impl Default for UrlContentSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Adds `https://` unless the URL already names http or https.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// Caps the page size, converts it to text and rejects near-empty pages.
pub fn extract_text(html: &str) -> Result<String, ContentSourceError> {
    let capped = truncate_with_marker(html, MAX_HTML_CHARS, TRUNCATION_MARKER);
    let text = html_to_text(&capped);
    if char_len(&text) < MIN_CONTENT_CHARS {
        return Err(ContentSourceError::InsufficientContent);
    }
    Ok(text)
}

/// Drops scripts, styles and tags, then collapses whitespace.
pub fn html_to_text(html: &str) -> String {
    let text = SCRIPT_RE.replace_all(html, "");
    let text = STYLE_RE.replace_all(&text, "");
    let text = TAG_RE.replace_all(&text, " ");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_https_when_scheme_missing() {
        assert_eq!(normalize_url("example.com/a"), "https://example.com/a");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
        assert_eq!(normalize_url(" https://example.com "), "https://example.com");
    }

    #[test]
    fn html_to_text_strips_scripts_styles_and_tags() {
        let html = r#"<html><head><style>body { color: red; }</style>
            <SCRIPT type="text/javascript">var x = "<p>hidden</p>";</SCRIPT></head>
            <body><h1>Title</h1><p>First   paragraph.</p>
            <p>Second<br/>line.</p></body></html>"#;

        assert_eq!(html_to_text(html), "Title First paragraph. Second line.");
    }

    #[test]
    fn extract_rejects_pages_with_little_text() {
        let html = "<html><body><p>Too short.</p><script>lots of code here</script></body></html>";
        assert!(matches!(
            extract_text(html),
            Err(ContentSourceError::InsufficientContent)
        ));
    }

    #[test]
    fn extract_returns_text_of_real_pages() {
        let body = "Rust is a systems programming language. ".repeat(5);
        let html = format!("<article><p>{body}</p></article>");

        let text = extract_text(&html).expect("enough text");

        assert_eq!(text, body.trim());
    }

    #[test]
    fn extract_caps_huge_pages() {
        let html = format!("<p>{}</p>", "word ".repeat(200_000));

        let text = extract_text(&html).expect("text");

        assert!(text.chars().count() <= MAX_HTML_CHARS + TRUNCATION_MARKER.len());
        assert!(text.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn status_error_mentions_code() {
        let err = ContentSourceError::Status {
            status: 404,
            reason: "Not Found".into(),
        };
        assert_eq!(err.to_string(), "Failed to fetch URL: 404 Not Found");
    }
}
