use futures::future::join_all;
use reqwest::header::{HeaderMap, LINK};
use reqwest::Url;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::config::SearchSpec;
use crate::error::{CrawlError, Result};
use crate::events::EventSink;
use crate::retry::RetryPolicy;
use crate::transport::{ApiResponse, RateLimitedTransport};

/// The search API never returns more than this many results, whatever
/// `total_count` claims.
pub const API_SEARCH_LIMIT: u64 = 1000;

/// One page of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    /// Only present on search responses.
    pub total_count: Option<u64>,
    /// Page number of the `rel="last"` link, when there is one.
    pub last_page: Option<u32>,
}

impl Page {
    pub fn from_response(url: &str, response: ApiResponse) -> Result<Self> {
        let last_page = parse_last_page(&response.headers);
        match response.body {
            Value::Array(items) => Ok(Page {
                items,
                total_count: None,
                last_page,
            }),
            Value::Object(mut body) => {
                let total_count = body.get("total_count").and_then(Value::as_u64);
                match body.remove("items") {
                    Some(Value::Array(items)) => Ok(Page {
                        items,
                        total_count,
                        last_page,
                    }),
                    _ => Err(CrawlError::Internal(format!(
                        "response from {} has no items array",
                        url
                    ))),
                }
            }
            _ => Err(CrawlError::Internal(format!(
                "response from {} is not a collection",
                url
            ))),
        }
    }

    /// Number of items the crawl may take from the whole collection.
    pub fn item_limit(&self) -> Option<usize> {
        self.total_count
            .map(|total| total.min(API_SEARCH_LIMIT) as usize)
    }
}

/// Page number of the `rel="last"` entry of a `Link` header.
pub fn parse_last_page(headers: &HeaderMap) -> Option<u32> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        let is_last = params
            .split(';')
            .any(|p| p.trim().replace(' ', "") == "rel=\"last\"");
        if !is_last {
            return None;
        }
        let target = target.trim().trim_start_matches('<').trim_end_matches('>');
        let url = Url::parse(target).ok()?;
        let page = url
            .query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok());
        page
    })
}

/// Fetches every page of a collection concurrently.
#[derive(Clone)]
pub struct PaginatedFetcher {
    transport: RateLimitedTransport,
    policy: RetryPolicy,
    sink: Arc<dyn EventSink>,
    page_size: u32,
}

impl PaginatedFetcher {
    pub fn new(
        transport: RateLimitedTransport,
        policy: RetryPolicy,
        sink: Arc<dyn EventSink>,
        page_size: u32,
    ) -> Self {
        PaginatedFetcher {
            transport,
            policy,
            sink,
            page_size: page_size.max(1),
        }
    }

    pub fn sink(&self) -> &dyn EventSink {
        self.sink.as_ref()
    }

    /// Fetch one page; `None` when a not-found was suppressed.
    pub async fn fetch_page(
        &self,
        url: &str,
        spec: &SearchSpec,
        number: u32,
    ) -> Result<Option<Page>> {
        let params = spec.page_params(number, self.page_size);
        match self
            .policy
            .execute(&self.transport, url, &params, self.sink.as_ref())
            .await?
        {
            Some(response) => Page::from_response(url, response).map(Some),
            None => Ok(None),
        }
    }

    /// Walk the whole collection at `url`.
    ///
    /// Page 1 is fetched first. Its items and pages `2..=last` are then
    /// processed concurrently. `on_page` runs once per page before that
    /// page's items go to `on_item`. Every spawned future is awaited before
    /// returning, and the first error among them is reported.
    pub async fn fetch_all<P, I, Fut>(
        &self,
        url: &str,
        spec: &SearchSpec,
        on_page: P,
        on_item: I,
    ) -> Result<()>
    where
        P: Fn(&Page, u32),
        I: Fn(Value) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let first = match self.fetch_page(url, spec, 1).await? {
            Some(page) => page,
            None => return Ok(()),
        };

        let item_limit = first.item_limit();
        let last_page = self.last_page_to_fetch(&first);
        debug!("{}: {} page(s) to fetch, item limit {:?}", url, last_page, item_limit);

        let on_page = &on_page;
        let on_item = &on_item;

        let first_done = self.process_page(first, 1, item_limit, on_page, on_item);
        let rest_done = join_all((2..=last_page).map(|number| async move {
            match self.fetch_page(url, spec, number).await? {
                Some(page) => {
                    self.process_page(page, number, item_limit, on_page, on_item)
                        .await
                }
                None => Ok(()),
            }
        }));

        let (first_result, rest_results) = futures::join!(first_done, rest_done);
        first_result?;
        rest_results.into_iter().collect()
    }

    fn last_page_to_fetch(&self, first: &Page) -> u32 {
        let linked = first.last_page.unwrap_or(1).max(1);
        match first.item_limit() {
            Some(limit) => {
                let pages = limit.div_ceil(self.page_size as usize).max(1);
                linked.min(pages as u32)
            }
            None => linked,
        }
    }

    async fn process_page<P, I, Fut>(
        &self,
        mut page: Page,
        number: u32,
        item_limit: Option<usize>,
        on_page: &P,
        on_item: &I,
    ) -> Result<()>
    where
        P: Fn(&Page, u32),
        I: Fn(Value) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        if let Some(limit) = item_limit {
            let before = (number as usize - 1) * self.page_size as usize;
            page.items.truncate(limit.saturating_sub(before));
        }
        debug!("Processing page {} with {} item(s)", number, page.items.len());

        on_page(&page, number);
        let items = std::mem::take(&mut page.items);
        join_all(items.into_iter().map(on_item))
            .await
            .into_iter()
            .collect()
    }
}

impl std::fmt::Debug for PaginatedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatedFetcher")
            .field("policy", &self.policy)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlConfig;
    use crate::events::NullSink;
    use crate::rate_limit::{RateLimitStatus, SystemClock};
    use reqwest::header::HeaderValue;
    use reqwest::StatusCode;
    use serde_json::json;

    fn link_headers(link: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(LINK, HeaderValue::from_str(link).unwrap());
        headers
    }

    fn fetcher(page_size: u32) -> PaginatedFetcher {
        let config = CrawlConfig::default();
        PaginatedFetcher::new(
            RateLimitedTransport::new(&config).unwrap(),
            RetryPolicy::new(false, false, Arc::new(SystemClock)),
            Arc::new(NullSink),
            page_size,
        )
    }

    fn page(total_count: Option<u64>, last_page: Option<u32>) -> Page {
        Page {
            items: Vec::new(),
            total_count,
            last_page,
        }
    }

    #[test]
    fn test_parse_last_page_from_github_link() {
        let headers = link_headers(
            "<https://api.github.com/search/issues?q=a&page=2&per_page=100>; rel=\"next\", \
             <https://api.github.com/search/issues?q=a&page=7&per_page=100>; rel=\"last\"",
        );
        assert_eq!(parse_last_page(&headers), Some(7));
    }

    #[test]
    fn test_parse_last_page_without_last_relation() {
        let headers = link_headers("<https://api.github.com/x?page=1>; rel=\"prev\"");
        assert_eq!(parse_last_page(&headers), None);
        assert_eq!(parse_last_page(&HeaderMap::new()), None);
    }

    #[test]
    fn test_page_from_search_response() {
        let response = ApiResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: json!({ "total_count": 2, "items": [{ "id": 1 }, { "id": 2 }] }),
            rate_limit: RateLimitStatus::from_response(StatusCode::OK, &HeaderMap::new()),
        };
        let page = Page::from_response("u", response).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_count, Some(2));
        assert_eq!(page.last_page, None);
    }

    #[test]
    fn test_page_from_malformed_response() {
        let response = ApiResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: json!({ "total_count": 2 }),
            rate_limit: RateLimitStatus::from_response(StatusCode::OK, &HeaderMap::new()),
        };
        assert!(matches!(
            Page::from_response("u", response),
            Err(CrawlError::Internal(_))
        ));
    }

    #[test]
    fn test_last_page_capped_by_search_ceiling() {
        let fetcher = fetcher(100);
        assert_eq!(fetcher.last_page_to_fetch(&page(Some(2500), Some(25))), 10);
        assert_eq!(fetcher.last_page_to_fetch(&page(Some(250), Some(3))), 3);
        assert_eq!(fetcher.last_page_to_fetch(&page(Some(0), None)), 1);
        assert_eq!(fetcher.last_page_to_fetch(&page(None, Some(4))), 4);
    }

    #[test]
    fn test_last_page_with_uneven_page_size() {
        let fetcher = fetcher(30);
        // 1000 / 30 rounds up to 34 pages.
        assert_eq!(fetcher.last_page_to_fetch(&page(Some(5000), Some(167))), 34);
    }
}
