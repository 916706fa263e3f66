use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ApiError, CrawlError, Result};
use crate::events::{Event, EventSink};
use crate::rate_limit::Clock;
use crate::transport::{ApiResponse, Outcome, RateLimitedTransport};

/// Extra sleep past the reset timestamp so the retry lands in the new window.
const RESET_SLACK_SECS: u64 = 1;

/// Decides what happens after each response: accept, skip, wait or fail.
#[derive(Clone)]
pub struct RetryPolicy {
    wait_on_rate_limit: bool,
    suppress_not_found: bool,
    clock: Arc<dyn Clock>,
}

impl RetryPolicy {
    pub fn new(wait_on_rate_limit: bool, suppress_not_found: bool, clock: Arc<dyn Clock>) -> Self {
        RetryPolicy {
            wait_on_rate_limit,
            suppress_not_found,
            clock,
        }
    }

    /// Fetch `url` until it succeeds or fails terminally.
    ///
    /// Returns `Ok(None)` for a suppressed not-found. Rate-limit waits are
    /// retried without a cap, and each wait is local to this call: sibling
    /// fetches keep going until they hit the limit themselves.
    pub async fn execute(
        &self,
        transport: &RateLimitedTransport,
        url: &str,
        params: &[(String, String)],
        sink: &dyn EventSink,
    ) -> Result<Option<ApiResponse>> {
        loop {
            let response = transport.fetch(url, params).await?;

            match response.outcome() {
                Outcome::Success => return Ok(Some(response)),
                Outcome::NotFound if self.suppress_not_found => {
                    warn!("Skipping not-found resource {}", url);
                    sink.emit(&Event::Skip {
                        headers: &response.headers,
                    });
                    return Ok(None);
                }
                Outcome::RateLimited if self.wait_on_rate_limit => {
                    let reset = response.rate_limit.reset;
                    let wait_secs = response.rate_limit.wait_seconds(self.clock.now());
                    warn!(
                        "Rate limit reached. Waiting {} seconds...",
                        wait_secs + RESET_SLACK_SECS
                    );

                    sink.emit(&Event::WaitStart { reset });
                    self.clock
                        .sleep(Duration::from_secs(wait_secs + RESET_SLACK_SECS))
                        .await;
                    sink.emit(&Event::WaitEnd { reset });

                    debug!("Retrying {} after rate-limit wait", url);
                }
                _ => {
                    return Err(CrawlError::Api(ApiError {
                        status: response.status,
                        body: response.body,
                        headers: response.headers,
                    }))
                }
            }
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("wait_on_rate_limit", &self.wait_on_rate_limit)
            .field("suppress_not_found", &self.suppress_not_found)
            .finish()
    }
}
