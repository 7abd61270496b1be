//! Ordered batches of crawl records

use crate::model::CrawlDatum;
use crate::url::RegexRule;
use serde_json::Value;

/// An ordered, mutable batch of crawl records
///
/// Executors fill a batch with newly discovered records; the bulk helpers let
/// a handler tag the whole batch (depth, referer, type) in one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlDatums {
    items: Vec<CrawlDatum>,
}

impl CrawlDatums {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, datum: CrawlDatum) -> &mut Self {
        self.items.push(datum);
        self
    }

    /// Adds an unexecuted record keyed by its URL
    pub fn add_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.add(CrawlDatum::new(url))
    }

    pub fn add_urls<I, S>(&mut self, urls: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for url in urls {
            self.add_url(url);
        }
        self
    }

    /// Applies one metadata key/value to every member
    pub fn meta(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        for datum in &mut self.items {
            datum.set_meta(key, value.clone());
        }
        self
    }

    /// Declares the same type on every member
    pub fn set_type(&mut self, type_: &str) -> &mut Self {
        for datum in &mut self.items {
            datum.set_type(type_);
        }
        self
    }

    /// Drops members whose URL does not satisfy `rule`
    pub fn filter_by_rule(&mut self, rule: &RegexRule) -> &mut Self {
        self.items.retain(|datum| rule.satisfy(datum.url()));
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CrawlDatum> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CrawlDatum> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, CrawlDatum> {
        self.items.iter_mut()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Removes all members, leaving the batch empty
    pub fn take(&mut self) -> Vec<CrawlDatum> {
        std::mem::take(&mut self.items)
    }

    pub fn as_slice(&self) -> &[CrawlDatum] {
        &self.items
    }
}

impl From<Vec<CrawlDatum>> for CrawlDatums {
    fn from(items: Vec<CrawlDatum>) -> Self {
        Self { items }
    }
}

impl FromIterator<CrawlDatum> for CrawlDatums {
    fn from_iter<T: IntoIterator<Item = CrawlDatum>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl Extend<CrawlDatum> for CrawlDatums {
    fn extend<T: IntoIterator<Item = CrawlDatum>>(&mut self, iter: T) {
        self.items.extend(iter);
    }
}

impl IntoIterator for CrawlDatums {
    type Item = CrawlDatum;
    type IntoIter = std::vec::IntoIter<CrawlDatum>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a CrawlDatums {
    type Item = &'a CrawlDatum;
    type IntoIter = std::slice::Iter<'a, CrawlDatum>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_urls_preserves_order() {
        let mut batch = CrawlDatums::new();
        batch.add_urls(["https://a.com/", "https://b.com/"]).add_url("https://c.com/");
        let urls: Vec<&str> = batch.iter().map(|d| d.url()).collect();
        assert_eq!(urls, vec!["https://a.com/", "https://b.com/", "https://c.com/"]);
    }

    #[test]
    fn test_bulk_meta_stamping() {
        let mut batch = CrawlDatums::new();
        batch.add_urls(["https://a.com/", "https://b.com/"]);
        batch.meta("depth", 3).meta("referer", "https://root.com/");

        for datum in &batch {
            assert_eq!(datum.meta_as_i64("depth"), Some(3));
            assert_eq!(datum.meta_as_str("referer"), Some("https://root.com/".to_string()));
        }
    }

    #[test]
    fn test_bulk_type() {
        let mut batch: CrawlDatums = vec![CrawlDatum::new("a"), CrawlDatum::new("b")].into();
        batch.set_type("content");
        assert!(batch.iter().all(|d| d.match_type("content")));
    }

    #[test]
    fn test_filter_by_rule() {
        let rule = RegexRule::from_rules(["+https://a\\.com/.*"]).unwrap();
        let mut batch = CrawlDatums::new();
        batch.add_urls(["https://a.com/x", "https://b.com/y", "https://a.com/z"]);
        batch.filter_by_rule(&rule);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.get(1).map(|d| d.url()), Some("https://a.com/z"));
    }

    #[test]
    fn test_take_empties_batch() {
        let mut batch = CrawlDatums::new();
        batch.add_url("a");
        let taken = batch.take();
        assert_eq!(taken.len(), 1);
        assert!(batch.is_empty());
    }
}
