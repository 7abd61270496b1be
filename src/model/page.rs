//! Fetched page handed to dispatcher handlers

use crate::model::CrawlDatum;
use crate::url::compile_full_match;
use crate::ConfigResult;

/// Result of fetching one crawl record
#[derive(Debug, Clone)]
pub struct Page {
    /// Record that produced this page
    pub datum: CrawlDatum,
    /// HTTP status code
    pub code: i32,
    /// Content-Type header value, if any
    pub content_type: Option<String>,
    /// URL the response was served from
    pub final_url: String,
    /// Location header for redirect responses
    pub location: Option<String>,
    /// Raw body
    pub body: Vec<u8>,
}

impl Page {
    /// Creates a page for `datum` with the datum's URL as final URL
    pub fn new(datum: CrawlDatum, code: i32, body: impl Into<Vec<u8>>) -> Self {
        let final_url = datum.url().to_string();
        Self {
            datum,
            code,
            content_type: None,
            final_url,
            location: None,
            body: body.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn url(&self) -> &str {
        self.datum.url()
    }

    pub fn key(&self) -> &str {
        self.datum.key()
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn html(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false)
    }

    /// Checks whether the page URL fully matches `pattern`
    pub fn matches_url(&self, pattern: &str) -> ConfigResult<bool> {
        Ok(compile_full_match(pattern)?.is_match(self.url()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_html() {
        let datum = CrawlDatum::new("https://example.com/");
        let page = Page::new(datum.clone(), 200, "<html></html>")
            .with_content_type("Text/HTML; charset=utf-8");
        assert!(page.is_html());

        let json = Page::new(datum.clone(), 200, "{}").with_content_type("application/json");
        assert!(!json.is_html());

        let bare = Page::new(datum, 200, "");
        assert!(!bare.is_html());
    }

    #[test]
    fn test_html_lossy() {
        let page = Page::new(CrawlDatum::new("u"), 200, vec![b'h', b'i', 0xff]);
        assert!(page.html().starts_with("hi"));
    }

    #[test]
    fn test_final_url_defaults_to_datum_url() {
        let page = Page::new(CrawlDatum::with_key("https://e.com/a", "k"), 200, "");
        assert_eq!(page.final_url, "https://e.com/a");
        assert_eq!(page.key(), "k");
    }
}
