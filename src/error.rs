use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Everything that can abort a crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Timeout or connection failure. Never retried by the engine.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success response that was neither suppressed nor waited out.
    #[error("{}", .0.message())]
    Api(#[from] ApiError),

    /// Anything the engine did not expect, such as a malformed body.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CrawlError {
    /// Short name of the error kind, for reporting unexpected failures
    /// without leaking their details to the end user.
    pub fn kind(&self) -> &'static str {
        match self {
            CrawlError::Transport { source, .. } if source.is_timeout() => "TransportTimeout",
            CrawlError::Transport { .. } => "TransportError",
            CrawlError::Api(_) => "ApiError",
            CrawlError::Internal(_) => "InternalError",
        }
    }
}

/// A response from the API that the engine refused to accept.
#[derive(Debug, Error)]
#[error("{}", self.message())]
pub struct ApiError {
    pub status: StatusCode,
    pub body: Value,
    pub headers: HeaderMap,
}

impl ApiError {
    /// Status line followed by the server-provided `message` field.
    pub fn message(&self) -> String {
        let detail = self
            .body
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        format!("{}: {}", self.status, detail)
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_error_message_uses_status_line_and_body_message() {
        let err = ApiError {
            status: StatusCode::NOT_FOUND,
            body: json!({ "message": "Not Found" }),
            headers: HeaderMap::new(),
        };
        assert_eq!(err.message(), "404 Not Found: Not Found");
        assert_eq!(CrawlError::from(err).to_string(), "404 Not Found: Not Found");
    }

    #[test]
    fn test_api_error_message_without_body_message() {
        let err = ApiError {
            status: StatusCode::BAD_GATEWAY,
            body: Value::Null,
            headers: HeaderMap::new(),
        };
        assert_eq!(err.message(), "502 Bad Gateway: ");
        assert_eq!(err.to_string(), err.message());
    }

    #[test]
    fn test_kind_names() {
        let api = CrawlError::Api(ApiError {
            status: StatusCode::FORBIDDEN,
            body: Value::Null,
            headers: HeaderMap::new(),
        });
        assert_eq!(api.kind(), "ApiError");
        assert_eq!(CrawlError::Internal("x".into()).kind(), "InternalError");
    }
}
