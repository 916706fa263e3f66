use std::collections::BTreeMap;
use std::time::Duration;

/// Default GitHub REST endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Largest page size the API accepts.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Requests in flight at once. GitHub answers bursts far above this with
/// its secondary rate limit.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub api_base_url: String,
    pub token: Option<String>,
    /// Sleep until the rate limit resets instead of failing.
    pub wait_on_rate_limit: bool,
    /// Turn 404 responses into `skip` events instead of failing.
    pub suppress_not_found: bool,
    pub page_size: u32,
    /// Upper bound on concurrent round trips, shared by the whole crawl.
    pub max_concurrency: usize,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        CrawlConfig {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token: None,
            wait_on_rate_limit: false,
            suppress_not_found: false,
            page_size: DEFAULT_PAGE_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("github-acquaintances/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl CrawlConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        CrawlConfig {
            api_base_url: api_base_url.into(),
            ..CrawlConfig::default()
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_wait_on_rate_limit(mut self, wait: bool) -> Self {
        self.wait_on_rate_limit = wait;
        self
    }

    pub fn with_suppress_not_found(mut self, suppress: bool) -> Self {
        self.suppress_not_found = suppress;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Search endpoint under the configured base URL.
    pub fn search_url(&self) -> String {
        format!("{}/search/issues", self.api_base_url.trim_end_matches('/'))
    }
}

/// Query parameters for a search, owned by the caller.
///
/// The engine never mutates a spec; it copies it and sets `page` and
/// `per_page` on the copy for every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSpec {
    params: BTreeMap<String, String>,
}

impl SearchSpec {
    pub fn new() -> Self {
        SearchSpec::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.params.insert(key.into(), value.to_string());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Parameters for one page request.
    pub fn page_params(&self, page: u32, per_page: u32) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = self
            .params
            .iter()
            .filter(|(k, _)| k.as_str() != "page" && k.as_str() != "per_page")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        params.push(("page".to_string(), page.to_string()));
        params.push(("per_page".to_string(), per_page.to_string()));
        params
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for SearchSpec {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut spec = SearchSpec::new();
        for (k, v) in iter {
            spec.insert(k, v);
        }
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_override_pagination_keys() {
        let spec = SearchSpec::new()
            .with("q", "author:alice")
            .with("page", 7)
            .with("per_page", 3);
        let params = spec.page_params(2, 100);
        assert_eq!(
            params,
            vec![
                ("q".to_string(), "author:alice".to_string()),
                ("page".to_string(), "2".to_string()),
                ("per_page".to_string(), "100".to_string()),
            ]
        );
        // The caller's spec is untouched.
        assert_eq!(spec.get("page"), Some("7"));
    }

    #[test]
    fn test_search_url_trims_trailing_slash() {
        let config = CrawlConfig::new("http://localhost:1234/");
        assert_eq!(config.search_url(), "http://localhost:1234/search/issues");
    }

    #[test]
    fn test_max_concurrency_is_at_least_one() {
        assert_eq!(CrawlConfig::default().max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(CrawlConfig::default().with_max_concurrency(0).max_concurrency, 1);
    }

    #[test]
    fn test_blank_token_is_dropped() {
        let config = CrawlConfig::default().with_token(Some("   ".to_string()));
        assert!(config.token.is_none());
    }
}
