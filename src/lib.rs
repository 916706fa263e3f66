//! # GitHub Acquaintances
//!
//! Finds out who you talk to on GitHub. Searches issues involving a user,
//! walks every comment thread of the results concurrently and tallies the
//! comment authors, coping with the API rate limit and with issues whose
//! repositories have gone missing.
//!
//! ## Main Components
//!
//! - [`Crawler`]: runs a crawl and returns the [`Tally`]
//! - [`CrawlConfig`] and [`SearchSpec`]: what to crawl and how
//! - [`Supervisor`]: per-crawl registry of event callbacks
//! - [`Args`]: command line arguments of the bundled binary
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use github_acquaintances_lib::{CrawlConfig, Crawler, EventKind, SearchSpec, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut supervisor = Supervisor::new();
//!     supervisor.on(EventKind::Issue, |_| eprint!("."));
//!
//!     let config = CrawlConfig::default().with_wait_on_rate_limit(true);
//!     let crawler = Crawler::new(config, Arc::new(supervisor))?;
//!
//!     let spec = SearchSpec::new().with("q", "author:octocat");
//!     for (author, count) in crawler.crawl(&spec).await?.ranked() {
//!         println!("{} = {}", author, count);
//!     }
//!     Ok(())
//! }
//! ```

mod args;
pub mod config;
mod crawler;
pub mod error;
pub mod events;
pub mod pagination;
pub mod query;
pub mod rate_limit;
pub mod report;
pub mod retry;
pub mod transport;

// Re-export main components for documentation and external use
pub use crate::args::{Args, Involvement, IssueState, IssueType, SearchIn, SortBy, SortOrder};
pub use crate::config::{CrawlConfig, SearchSpec};
pub use crate::crawler::{Crawler, Tally};
pub use crate::error::{ApiError, CrawlError, Result};
pub use crate::events::{Event, EventKind, EventSink, NullSink, Supervisor};
pub use crate::rate_limit::{Clock, RateLimitStatus, SystemClock};
