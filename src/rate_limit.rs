use chrono::Utc;
use futures::future::BoxFuture;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::time::Duration;

pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Rate-limit view of a single response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Requests left in the window, `-1` when the header is missing.
    pub remaining: i64,
    /// Epoch seconds at which the window resets, `0` when the header is missing.
    pub reset: i64,
    pub status: StatusCode,
}

impl RateLimitStatus {
    pub fn from_response(status: StatusCode, headers: &HeaderMap) -> Self {
        RateLimitStatus {
            remaining: header_i64(headers, REMAINING_HEADER).unwrap_or(-1),
            reset: header_i64(headers, RESET_HEADER).unwrap_or(0),
            status,
        }
    }

    /// The server refused the request because the window is used up.
    pub fn exhausted(&self) -> bool {
        self.status == StatusCode::FORBIDDEN && self.remaining == 0
    }

    /// Seconds until the reset, never negative.
    pub fn wait_seconds(&self, now: i64) -> u64 {
        (self.reset - now).max(0) as u64
    }
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok())
}

/// Source of wall-clock time and sleeping for rate-limit waits.
pub trait Clock: Send + Sync {
    /// Current time in epoch seconds.
    fn now(&self) -> i64;

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(remaining: Option<&str>, reset: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(r) = remaining {
            map.insert(REMAINING_HEADER, HeaderValue::from_str(r).unwrap());
        }
        if let Some(r) = reset {
            map.insert(RESET_HEADER, HeaderValue::from_str(r).unwrap());
        }
        map
    }

    #[test]
    fn test_parses_both_headers() {
        let status = RateLimitStatus::from_response(
            StatusCode::OK,
            &headers(Some("42"), Some("1700000000")),
        );
        assert_eq!(status.remaining, 42);
        assert_eq!(status.reset, 1_700_000_000);
        assert!(!status.exhausted());
    }

    #[test]
    fn test_missing_remaining_is_never_exhausted() {
        let status = RateLimitStatus::from_response(StatusCode::FORBIDDEN, &headers(None, None));
        assert_eq!(status.remaining, -1);
        assert!(!status.exhausted());
        assert_eq!(status.wait_seconds(1_700_000_000), 0);
    }

    #[test]
    fn test_exhausted_requires_forbidden() {
        let h = headers(Some("0"), Some("100"));
        assert!(RateLimitStatus::from_response(StatusCode::FORBIDDEN, &h).exhausted());
        assert!(!RateLimitStatus::from_response(StatusCode::OK, &h).exhausted());
    }

    #[test]
    fn test_wait_seconds_clamps_at_zero() {
        let status =
            RateLimitStatus::from_response(StatusCode::FORBIDDEN, &headers(Some("0"), Some("100")));
        assert_eq!(status.wait_seconds(40), 60);
        assert_eq!(status.wait_seconds(100), 0);
        assert_eq!(status.wait_seconds(500), 0);
    }

    #[test]
    fn test_garbage_headers_fall_back() {
        let status =
            RateLimitStatus::from_response(StatusCode::OK, &headers(Some("lots"), Some("soon")));
        assert_eq!(status.remaining, -1);
        assert_eq!(status.reset, 0);
    }
}
