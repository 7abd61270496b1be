//! Crawler module: the fetch cycle and everything that feeds it
//!
//! This module contains the core crawling logic, including:
//! - Generating pending records from the store and feeding a bounded queue
//! - A worker pool driven by a monitoring controller
//! - HTTP fetching, handler dispatch and link extraction
//! - Filtering of discovered records and the multi-depth crawl loop

mod coordinator;
mod dispatcher;
mod executor;
mod feeder;
mod fetcher;
mod filter;
mod generator;
mod parser;
mod queue;
mod scheduler;

pub use coordinator::{CrawlReport, Crawler};
pub use dispatcher::{Dispatcher, DispatcherBuilder, Handler, HandlerKind};
pub use executor::{Executor, FnExecutor, VisitorExecutor};
pub use feeder::QueueFeeder;
pub use fetcher::{build_http_client, user_agent_string, HttpRequester, Requester};
pub use filter::{
    DepthFilter, KeyDedupFilter, NextFilter, NextFilterChain, UrlRuleNextFilter, META_KEY_DEPTH,
    META_KEY_REFERER,
};
pub use generator::{
    Generator, GeneratorFactory, GeneratorFilter, GeneratorOptions, StatusGeneratorFilter,
    StoreGenerator, StoreGeneratorFactory, UrlRuleGeneratorFilter,
};
pub use parser::{extract_links, HtmlLinkExtractor, LinkExtractor};
pub use queue::FetchQueue;
pub use scheduler::{CycleSummary, Scheduler, SchedulerOptions, StopHandle};

use crate::config::Config;
use crate::model::{CrawlDatum, CrawlDatums, Page};
use crate::storage::SharedStore;
use crate::url::RegexRule;
use crate::Result;
use std::sync::Arc;

/// HTTP codes whose Location target is queued as a new record
pub const REDIRECT_CODES: [i32; 5] = [301, 302, 303, 307, 308];

/// Builds a ready-to-start HTTP crawler from a loaded configuration
///
/// The crawler fetches with [`HttpRequester`], follows redirects by queueing
/// their targets, and auto-parses HTML. Every discovered record, redirect
/// targets included, must satisfy `[rules]` and is then filtered by depth and
/// by key against `store`.
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `store` - The frontier store, shared with the crawler's filters
///
/// # Returns
///
/// * `Ok(Crawler)` - Crawler with seeds, options and executor applied
/// * `Err(CrawlError)` - HTTP client or handler setup failed
pub fn crawler_from_config(config: &Config, store: SharedStore) -> Result<Crawler> {
    let requester = HttpRequester::from_config(&config.user_agent, &config.http)?;
    let link_rule = config.link_rule()?;

    let dispatcher = DispatcherBuilder::new()
        .match_code(&REDIRECT_CODES, follow_redirect)
        .visit(log_visit)
        .auto_parse(config.crawler.auto_parse)
        .link_rule(link_rule.clone())
        .link_extractor(Arc::new(HtmlLinkExtractor::new(config.crawler.parse_img)))
        .build()?;

    let next_filter = next_filter_chain(link_rule, config.crawler.max_depth, &store);

    let mut crawler = Crawler::new(store)
        .with_executor(Arc::new(VisitorExecutor::new(
            Arc::new(requester),
            Arc::new(dispatcher),
        )))
        .with_next_filter(Arc::new(next_filter))
        .with_options(config.scheduler_options())
        .with_generator_options(config.generator_options())
        .resumable(config.crawler.resumable);

    for url in &config.seeds.urls {
        crawler.add_seed(CrawlDatum::new(url.as_str()));
    }
    for url in &config.seeds.forced {
        crawler.add_forced_seed(CrawlDatum::new(url.as_str()));
    }

    Ok(crawler)
}

fn next_filter_chain(
    link_rule: RegexRule,
    max_depth: Option<u32>,
    store: &SharedStore,
) -> NextFilterChain {
    let mut chain = NextFilterChain::new();
    if !link_rule.is_empty() {
        chain = chain.with(Arc::new(UrlRuleNextFilter::new(link_rule)));
    }
    chain
        .with(Arc::new(DepthFilter::new(max_depth)))
        .with(Arc::new(KeyDedupFilter::new(Arc::clone(store))))
}

fn follow_redirect(page: &Page, next: &mut CrawlDatums) -> anyhow::Result<()> {
    match &page.location {
        Some(location) => {
            tracing::debug!("{} redirects ({}) to {}", page.url(), page.code, location);
            next.add_url(location.as_str());
        }
        None => tracing::warn!("Redirect {} from {} without a Location", page.code, page.url()),
    }
    Ok(())
}

fn log_visit(page: &Page, _next: &mut CrawlDatums) -> anyhow::Result<()> {
    tracing::debug!(
        "Visited {} ({}, {} bytes)",
        page.url(),
        page.content_type.as_deref().unwrap_or("no content type"),
        page.body.len()
    );
    Ok(())
}
