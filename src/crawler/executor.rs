//! Executors perform the fetch-and-extract step for one crawl record

use crate::crawler::dispatcher::Dispatcher;
use crate::crawler::fetcher::Requester;
use crate::model::{CrawlDatum, CrawlDatums};
use async_trait::async_trait;
use std::sync::Arc;

/// Fetch logic invoked by the worker pool
///
/// Implementations may set the record's code, location and metadata, and push
/// newly discovered records onto `next`. Returning an error marks the record
/// failed; it never stops the worker. Called concurrently with distinct records.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, datum: &mut CrawlDatum, next: &mut CrawlDatums) -> anyhow::Result<()>;
}

/// Adapts a synchronous closure into an [`Executor`]
pub struct FnExecutor<F> {
    f: F,
}

impl<F> FnExecutor<F>
where
    F: Fn(&mut CrawlDatum, &mut CrawlDatums) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Executor for FnExecutor<F>
where
    F: Fn(&mut CrawlDatum, &mut CrawlDatums) -> anyhow::Result<()> + Send + Sync,
{
    async fn execute(&self, datum: &mut CrawlDatum, next: &mut CrawlDatums) -> anyhow::Result<()> {
        (self.f)(datum, next)
    }
}

/// Fetches a record with a [`Requester`] and hands the page to a [`Dispatcher`]
pub struct VisitorExecutor {
    requester: Arc<dyn Requester>,
    dispatcher: Arc<Dispatcher>,
}

impl VisitorExecutor {
    pub fn new(requester: Arc<dyn Requester>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            requester,
            dispatcher,
        }
    }
}

#[async_trait]
impl Executor for VisitorExecutor {
    async fn execute(&self, datum: &mut CrawlDatum, next: &mut CrawlDatums) -> anyhow::Result<()> {
        let page = self.requester.request(datum).await?;
        datum.set_code(page.code);
        datum.set_location(page.location.clone());

        if page.code >= 400 && !self.dispatcher.handles_code(page.code) {
            anyhow::bail!("HTTP {} for {}", page.code, datum.url());
        }

        self.dispatcher.dispatch(&page, next)
    }
}
