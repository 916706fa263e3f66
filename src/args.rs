use clap::{Parser, ValueEnum};

use crate::config::{DEFAULT_API_BASE_URL, DEFAULT_MAX_CONCURRENCY};

/// Find out who you talk to on GitHub: counts comment authors across the
/// issues matching a search.
#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    long_about = "Searches GitHub issues involving a user and tallies the authors of every comment in those threads, waiting out rate limits and skipping missing resources on request."
)]
pub struct Args {
    /// GitHub username to search issues for.
    pub username: String,

    /// How the given user is involved in the issues.
    #[clap(short, long, value_enum, default_value = "author")]
    pub involvement: Involvement,

    /// Text to filter issues.
    #[clap(long)]
    pub text: Option<String>,

    /// Where the text should be searched.
    #[clap(long = "in", value_enum)]
    pub in_: Option<SearchIn>,

    /// Restrict to just issues or just pull requests.
    #[clap(long = "type", value_enum)]
    pub type_: Option<IssueType>,

    /// Restrict to open or closed issues.
    #[clap(long, value_enum)]
    pub state: Option<IssueState>,

    /// Date expression to filter by creation date.
    #[clap(long)]
    pub created: Option<String>,

    /// Date expression to filter by update date.
    #[clap(long)]
    pub updated: Option<String>,

    /// Label to filter by.
    #[clap(long)]
    pub label: Option<String>,

    /// Repository language to filter by.
    #[clap(long)]
    pub language: Option<String>,

    /// Sort search results (matters with more than 1000 results).
    #[clap(long, value_enum)]
    pub sort: Option<SortBy>,

    /// Sort order (matters with more than 1000 results).
    #[clap(long, value_enum)]
    pub order: Option<SortOrder>,

    /// GitHub API token. Falls back to GITHUB_TOKEN.
    #[clap(short, long)]
    pub token: Option<String>,

    /// Wait for the rate limit to reset instead of failing.
    #[clap(short, long)]
    pub wait_rate_limit: bool,

    /// Skip resources that are not found (such as disabled repositories).
    #[clap(short, long = "skip-404")]
    pub skip_404: bool,

    /// Show a progress bar.
    #[clap(short = 'b', long)]
    pub progress_bar: bool,

    /// Do not print info messages.
    #[clap(long)]
    pub no_info: bool,

    /// Maximum number of requests in flight at once.
    #[clap(short = 'c', long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    pub concurrency: usize,

    /// API endpoint to talk to.
    #[clap(long, default_value = DEFAULT_API_BASE_URL)]
    pub api_endpoint: String,

    /// Increase logging verbosity (-v, -vv).
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Involvement {
    Author,
    Involves,
    Mentions,
    Assigned,
    Commenter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchIn {
    Title,
    Body,
    Comments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IssueType {
    Issue,
    Pr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IssueState {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortBy {
    Comments,
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Name clap uses for a value, which is also the GitHub qualifier value.
pub fn value_name<T: ValueEnum>(value: &T) -> String {
    value
        .to_possible_value()
        .map(|v| v.get_name().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_flags() {
        let args = Args::parse_from([
            "github-acquaintances",
            "alice",
            "-i",
            "commenter",
            "--type",
            "pr",
            "-w",
            "-s",
            "-c",
            "4",
        ]);
        assert_eq!(args.username, "alice");
        assert_eq!(args.involvement, Involvement::Commenter);
        assert_eq!(args.type_, Some(IssueType::Pr));
        assert!(args.wait_rate_limit);
        assert!(args.skip_404);
        assert!(!args.progress_bar);
        assert_eq!(args.concurrency, 4);
        assert_eq!(args.api_endpoint, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_value_name_matches_cli_spelling() {
        assert_eq!(value_name(&Involvement::Mentions), "mentions");
        assert_eq!(value_name(&IssueType::Pr), "pr");
    }
}
