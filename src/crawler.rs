use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info};

use crate::config::{CrawlConfig, SearchSpec};
use crate::error::{CrawlError, Result};
use crate::events::{Event, EventSink};
use crate::pagination::PaginatedFetcher;
use crate::rate_limit::{Clock, SystemClock};
use crate::retry::RetryPolicy;
use crate::transport::RateLimitedTransport;

/// Comment counts per author.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    counts: HashMap<String, u64>,
}

impl Tally {
    pub fn get(&self, author: &str) -> u64 {
        self.counts.get(author).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Authors by count, highest first; ties broken by name.
    pub fn ranked(&self) -> Vec<(String, u64)> {
        let mut ranked: Vec<(String, u64)> =
            self.counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    pub fn as_map(&self) -> &HashMap<String, u64> {
        &self.counts
    }

    pub fn into_map(self) -> HashMap<String, u64> {
        self.counts
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for Tally {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        Tally {
            counts: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Shared accumulator for one crawl.
#[derive(Debug, Default)]
struct TallyBuilder {
    counts: Mutex<HashMap<String, u64>>,
}

impl TallyBuilder {
    fn record(&self, author: &str) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        *counts.entry(author.to_string()).or_insert(0) += 1;
    }

    fn finish(self) -> Tally {
        Tally {
            counts: self.counts.into_inner().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// Crawls issue search results and tallies the authors of their comments.
#[derive(Debug, Clone)]
pub struct Crawler {
    config: CrawlConfig,
    fetcher: PaginatedFetcher,
}

impl Crawler {
    pub fn new(config: CrawlConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        Crawler::with_clock(config, sink, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: CrawlConfig,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let transport = RateLimitedTransport::new(&config)?;
        let policy = RetryPolicy::new(config.wait_on_rate_limit, config.suppress_not_found, clock);
        let fetcher = PaginatedFetcher::new(transport, policy, sink, config.page_size);
        Ok(Crawler { config, fetcher })
    }

    /// Run one crawl. On error the partial tally is dropped.
    pub async fn crawl(&self, spec: &SearchSpec) -> Result<Tally> {
        let tally = TallyBuilder::default();
        let search_url = self.config.search_url();
        let sink = self.fetcher.sink();

        let result = self
            .fetcher
            .fetch_all(
                &search_url,
                spec,
                |page, number| sink.emit(&Event::SearchPage { page, number }),
                |issue| self.process_issue(issue, &tally),
            )
            .await;

        match result {
            Ok(()) => {
                let tally = tally.finish();
                info!(
                    "Crawl finished: {} comment(s) from {} author(s)",
                    tally.total(),
                    tally.len()
                );
                sink.emit(&Event::FinishOk);
                Ok(tally)
            }
            Err(e) => {
                error!("Crawl aborted: {}", e);
                sink.emit(&Event::FinishError);
                Err(e)
            }
        }
    }

    async fn process_issue(&self, issue: Value, tally: &TallyBuilder) -> Result<()> {
        let comments_url = issue
            .get("comments_url")
            .and_then(Value::as_str)
            .ok_or_else(|| CrawlError::Internal("issue without comments_url".to_string()))?;
        let sink = self.fetcher.sink();

        debug!("Fetching comments from {}", comments_url);
        self.fetcher
            .fetch_all(
                comments_url,
                &SearchSpec::new(),
                |_, _| {},
                |comment| async move {
                    let author = comment_author(&comment)?;
                    tally.record(author);
                    sink.emit(&Event::Comment(&comment));
                    Ok::<(), CrawlError>(())
                },
            )
            .await?;

        sink.emit(&Event::Issue(&issue));
        Ok(())
    }
}

fn comment_author(comment: &Value) -> Result<&str> {
    comment
        .get("user")
        .and_then(|user| user.get("login"))
        .and_then(Value::as_str)
        .ok_or_else(|| CrawlError::Internal("comment without user.login".to_string()))
}
