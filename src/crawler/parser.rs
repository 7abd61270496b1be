//! HTML link extraction for auto-parsing
//!
//! This module extracts outlinks from fetched pages:
//! - Links from `<a href>` tags (skipping `download` links)
//! - Optionally image sources from `<img src>` tags
//!
//! Links are resolved against the page URL, stripped of fragments and
//! deduplicated in document order.

use crate::model::Page;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracts candidate outlinks from a page
pub trait LinkExtractor: Send + Sync {
    fn extract(&self, page: &Page) -> Vec<String>;
}

/// [`LinkExtractor`] backed by an HTML parser
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlLinkExtractor {
    /// Also extract `<img src>` targets
    pub parse_img: bool,
}

impl HtmlLinkExtractor {
    pub fn new(parse_img: bool) -> Self {
        Self { parse_img }
    }
}

impl LinkExtractor for HtmlLinkExtractor {
    fn extract(&self, page: &Page) -> Vec<String> {
        let base_url = match Url::parse(&page.final_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Cannot extract links, bad base URL {}: {}", page.final_url, e);
                return Vec::new();
            }
        };
        extract_links(&page.html(), &base_url, self.parse_img)
    }
}

/// Extracts absolute http(s) links from an HTML document
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The base URL for resolving relative links
/// * `parse_img` - Whether `<img src>` targets are included
///
/// # Returns
///
/// Absolute URLs in document order, without fragments or duplicates
///
/// # Example
///
/// ```
/// use crawl_frontier::crawler::extract_links;
/// use url::Url;
///
/// let html = r#"<a href="/page#top">Link</a><a href="/page">Again</a>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// assert_eq!(extract_links(html, &base_url, false), vec!["https://example.com/page"]);
/// ```
pub fn extract_links(html: &str, base_url: &Url, parse_img: bool) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let mut push = |href: &str| {
        if let Some(absolute) = resolve_link(href, base_url) {
            if seen.insert(absolute.clone()) {
                links.push(absolute);
            }
        }
    };

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    if parse_img {
        if let Ok(img_selector) = Selector::parse("img[src]") {
            for element in document.select(&img_selector) {
                if let Some(src) = element.value().attr("src") {
                    push(src);
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None for empty or fragment-only hrefs, `javascript:`, `mailto:`,
/// `tel:` and `data:` links, unparsable URLs and non-HTTP(S) targets.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }
    absolute_url.set_fragment(None);
    Some(absolute_url.to_string())
}
