use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::config::CrawlConfig;
use crate::error::{CrawlError, Result};
use crate::rate_limit::RateLimitStatus;

/// How a single response should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    NotFound,
    RateLimited,
    Failed,
}

/// One raw API response.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub rate_limit: RateLimitStatus,
}

impl ApiResponse {
    pub fn outcome(&self) -> Outcome {
        if self.status.is_success() {
            Outcome::Success
        } else if self.status == StatusCode::NOT_FOUND {
            Outcome::NotFound
        } else if self.rate_limit.exhausted() {
            Outcome::RateLimited
        } else {
            Outcome::Failed
        }
    }
}

/// GET requests against the API over one shared connection pool.
///
/// Clones share a semaphore that bounds how many round trips are in
/// flight at once.
#[derive(Debug, Clone)]
pub struct RateLimitedTransport {
    client: Client,
    token: Option<String>,
    limiter: Arc<Semaphore>,
}

impl RateLimitedTransport {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| CrawlError::Internal(format!("cannot build HTTP client: {}", e)))?;

        Ok(RateLimitedTransport {
            client,
            token: config.token.clone(),
            limiter: Arc::new(Semaphore::new(config.max_concurrency)),
        })
    }

    /// Issue exactly one request.
    ///
    /// Error statuses are returned as responses for the caller to classify.
    /// Only timeouts and connection failures are errors here.
    pub async fn fetch(&self, url: &str, params: &[(String, String)]) -> Result<ApiResponse> {
        debug!("Requesting URL: {} {:?}", url, params);

        let mut request = self
            .client
            .get(url)
            .query(params)
            .header(ACCEPT, "application/vnd.github.v3+json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("token {}", token));
        }

        // Held for the round trip only, never across a rate-limit sleep
        let permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| CrawlError::Internal(format!("request limiter closed: {}", e)))?;

        let response = request.send().await.map_err(|source| CrawlError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let rate_limit = RateLimitStatus::from_response(status, &headers);

        let text = response.text().await.map_err(|source| CrawlError::Transport {
            url: url.to_string(),
            source,
        })?;
        drop(permit);

        let body = if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                CrawlError::Internal(format!("malformed JSON from {}: {}", url, e))
            })?
        } else {
            // Error bodies are informational only.
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        debug!(
            "{} -> {} (remaining {}, reset {})",
            url, status, rate_limit.remaining, rate_limit.reset
        );

        Ok(ApiResponse {
            status,
            headers,
            body,
            rate_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::REMAINING_HEADER;
    use reqwest::header::HeaderValue;

    fn response(status: StatusCode, remaining: Option<&str>) -> ApiResponse {
        let mut headers = HeaderMap::new();
        if let Some(r) = remaining {
            headers.insert(REMAINING_HEADER, HeaderValue::from_str(r).unwrap());
        }
        let rate_limit = RateLimitStatus::from_response(status, &headers);
        ApiResponse {
            status,
            headers,
            body: Value::Null,
            rate_limit,
        }
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(response(StatusCode::OK, Some("10")).outcome(), Outcome::Success);
        assert_eq!(response(StatusCode::NOT_FOUND, None).outcome(), Outcome::NotFound);
        assert_eq!(
            response(StatusCode::FORBIDDEN, Some("0")).outcome(),
            Outcome::RateLimited
        );
        assert_eq!(response(StatusCode::FORBIDDEN, Some("5")).outcome(), Outcome::Failed);
        assert_eq!(response(StatusCode::FORBIDDEN, None).outcome(), Outcome::Failed);
        assert_eq!(
            response(StatusCode::INTERNAL_SERVER_ERROR, Some("0")).outcome(),
            Outcome::Failed
        );
    }

    #[test]
    fn test_transport_builds_from_default_config() {
        assert!(RateLimitedTransport::new(&CrawlConfig::default()).is_ok());
    }
}
