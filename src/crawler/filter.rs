//! Filters applied to newly discovered records before they are persisted

use crate::model::CrawlDatum;
use crate::storage::{lock_store, SharedStore};
use crate::url::RegexRule;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Metadata key holding a record's crawl depth
pub const META_KEY_DEPTH: &str = "depth";

/// Metadata key holding the URL of the page a record was discovered on
pub const META_KEY_REFERER: &str = "referer";

/// Post-processes a discovered candidate
///
/// Returning `None` drops the candidate.
pub trait NextFilter: Send + Sync {
    fn filter(&self, candidate: CrawlDatum, referrer: &CrawlDatum) -> Option<CrawlDatum>;

    /// Forgets per-cycle state; called when a fetch cycle opens
    fn reset(&self) {}
}

impl<F> NextFilter for F
where
    F: Fn(CrawlDatum, &CrawlDatum) -> Option<CrawlDatum> + Send + Sync,
{
    fn filter(&self, candidate: CrawlDatum, referrer: &CrawlDatum) -> Option<CrawlDatum> {
        self(candidate, referrer)
    }
}

/// Runs filters in order; the first `None` drops the candidate
#[derive(Clone, Default)]
pub struct NextFilterChain {
    filters: Vec<Arc<dyn NextFilter>>,
}

impl NextFilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: Arc<dyn NextFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl NextFilter for NextFilterChain {
    fn filter(&self, candidate: CrawlDatum, referrer: &CrawlDatum) -> Option<CrawlDatum> {
        self.filters
            .iter()
            .try_fold(candidate, |datum, f| f.filter(datum, referrer))
    }

    fn reset(&self) {
        for filter in &self.filters {
            filter.reset();
        }
    }
}

/// Drops candidates whose key is already in the store or was seen this cycle
pub struct KeyDedupFilter {
    store: SharedStore,
    seen: Mutex<HashSet<String>>,
}

impl KeyDedupFilter {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            seen: Mutex::new(HashSet::new()),
        }
    }
}

impl NextFilter for KeyDedupFilter {
    fn filter(&self, candidate: CrawlDatum, _referrer: &CrawlDatum) -> Option<CrawlDatum> {
        let known = match lock_store(&self.store).and_then(|s| s.contains(candidate.key())) {
            Ok(known) => known,
            Err(e) => {
                // Merge deduplicates anyway; keep the candidate.
                tracing::warn!("Dedup lookup failed for {}: {}", candidate.key(), e);
                false
            }
        };
        if known {
            return None;
        }

        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if seen.insert(candidate.key().to_string()) {
            Some(candidate)
        } else {
            None
        }
    }

    fn reset(&self) {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// Stamps depth and referer on candidates and enforces a maximum depth
///
/// Seeds without a depth are treated as depth 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthFilter {
    max_depth: Option<u32>,
}

impl DepthFilter {
    pub fn new(max_depth: Option<u32>) -> Self {
        Self { max_depth }
    }
}

impl NextFilter for DepthFilter {
    fn filter(&self, mut candidate: CrawlDatum, referrer: &CrawlDatum) -> Option<CrawlDatum> {
        let depth = referrer.meta_as_i64(META_KEY_DEPTH).unwrap_or(1) + 1;
        if let Some(max) = self.max_depth {
            if depth > i64::from(max) {
                return None;
            }
        }
        candidate.set_meta(META_KEY_DEPTH, depth);
        if candidate.get_meta(META_KEY_REFERER).is_none() {
            candidate.set_meta(META_KEY_REFERER, referrer.url());
        }
        Some(candidate)
    }
}

/// Admits candidates whose URL satisfies a regex rule
#[derive(Debug, Clone)]
pub struct UrlRuleNextFilter {
    rule: RegexRule,
}

impl UrlRuleNextFilter {
    pub fn new(rule: RegexRule) -> Self {
        Self { rule }
    }
}

impl NextFilter for UrlRuleNextFilter {
    fn filter(&self, candidate: CrawlDatum, _referrer: &CrawlDatum) -> Option<CrawlDatum> {
        self.rule.satisfy(candidate.url()).then_some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{share, CrawlStore, MemoryStore};

    #[test]
    fn test_depth_filter_stamps_and_limits() {
        let filter = DepthFilter::new(Some(3));
        let seed = CrawlDatum::new("https://a.com/");

        let child = filter.filter(CrawlDatum::new("https://a.com/1"), &seed).unwrap();
        assert_eq!(child.meta_as_i64(META_KEY_DEPTH), Some(2));
        assert_eq!(child.meta_as_str(META_KEY_REFERER), Some("https://a.com/".to_string()));

        let grandchild = filter.filter(CrawlDatum::new("https://a.com/2"), &child).unwrap();
        assert_eq!(grandchild.meta_as_i64(META_KEY_DEPTH), Some(3));

        assert!(filter.filter(CrawlDatum::new("https://a.com/3"), &grandchild).is_none());
    }

    #[test]
    fn test_key_dedup_filter() {
        let mut store = MemoryStore::new();
        store.inject(&[CrawlDatum::new("known")], false).unwrap();
        let filter = KeyDedupFilter::new(share(store));
        let referrer = CrawlDatum::new("r");

        assert!(filter.filter(CrawlDatum::new("known"), &referrer).is_none());
        assert!(filter.filter(CrawlDatum::new("fresh"), &referrer).is_some());
        assert!(filter.filter(CrawlDatum::new("fresh"), &referrer).is_none());
        assert!(filter
            .filter(CrawlDatum::with_key("fresh", "fresh#v2"), &referrer)
            .is_some());
    }

    #[test]
    fn test_key_dedup_reset_through_chain() {
        let dedup = Arc::new(KeyDedupFilter::new(share(MemoryStore::new())));
        let chain = NextFilterChain::new().with(dedup);
        let referrer = CrawlDatum::new("r");

        assert!(chain.filter(CrawlDatum::new("page"), &referrer).is_some());
        assert!(chain.filter(CrawlDatum::new("page"), &referrer).is_none());

        chain.reset();
        assert!(chain.filter(CrawlDatum::new("page"), &referrer).is_some());
    }

    #[test]
    fn test_chain_short_circuits() {
        let rule = RegexRule::from_rules(["+https://a\\.com/.*"]).unwrap();
        let chain = NextFilterChain::new()
            .with(Arc::new(UrlRuleNextFilter::new(rule)))
            .with(Arc::new(DepthFilter::new(None)));
        let referrer = CrawlDatum::new("https://a.com/");

        let kept = chain.filter(CrawlDatum::new("https://a.com/x"), &referrer).unwrap();
        assert_eq!(kept.meta_as_i64(META_KEY_DEPTH), Some(2));
        assert!(chain.filter(CrawlDatum::new("https://b.com/x"), &referrer).is_none());
    }

    #[test]
    fn test_closure_filter() {
        let filter = |c: CrawlDatum, _r: &CrawlDatum| (!c.url().contains("logout")).then_some(c);
        let referrer = CrawlDatum::new("r");
        assert!(NextFilter::filter(&filter, CrawlDatum::new("https://a.com/logout"), &referrer).is_none());
    }
}
