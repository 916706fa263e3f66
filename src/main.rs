use clap::Parser;
use dotenv::dotenv;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use github_acquaintances_lib::query::build_search_spec;
use github_acquaintances_lib::report::{attach_info_messages, attach_progress_bar, format_tally};
use github_acquaintances_lib::{Args, CrawlConfig, CrawlError, Crawler, Supervisor};

/// Exit status for failed communication with the API.
const EXIT_COMMUNICATION: u8 = 7;
/// Exit status for anything unexpected.
const EXIT_FATAL: u8 = 10;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(args.verbose);

    dotenv().ok();

    // Token from arguments or environment; anonymous access is allowed
    let token = match &args.token {
        Some(t) if !t.trim().is_empty() => Some(t.clone()),
        _ => env::var("GITHUB_TOKEN").ok().filter(|t| !t.trim().is_empty()),
    };
    if token.is_none() {
        debug!("No GitHub token, using anonymous rate limit");
    }

    let config = CrawlConfig::new(args.api_endpoint.clone())
        .with_token(token)
        .with_wait_on_rate_limit(args.wait_rate_limit)
        .with_suppress_not_found(args.skip_404)
        .with_max_concurrency(args.concurrency);
    let spec = build_search_spec(&args);
    debug!("Search parameters: {:?}", spec);

    let mut supervisor = Supervisor::new();
    if args.progress_bar {
        attach_progress_bar(&mut supervisor);
    } else if !args.no_info {
        attach_info_messages(&mut supervisor);
    }

    let crawler = match Crawler::new(config, Arc::new(supervisor)) {
        Ok(crawler) => crawler,
        Err(e) => return report_failure(&e, !args.no_info),
    };

    match crawler.crawl(&spec).await {
        Ok(tally) => {
            if !args.no_info {
                eprintln!("Gathered acquaintances successfully:");
            }
            println!("{}", format_tally(&tally));
            ExitCode::SUCCESS
        }
        Err(e) => report_failure(&e, !args.no_info),
    }
}

fn report_failure(err: &CrawlError, info: bool) -> ExitCode {
    match err {
        CrawlError::Api(_) | CrawlError::Transport { .. } => {
            if info {
                eprintln!("Ended with communication error:");
            }
            eprintln!("{}", err);
            ExitCode::from(EXIT_COMMUNICATION)
        }
        CrawlError::Internal(_) => {
            if info {
                eprintln!("Ended with fatal error:");
            }
            eprintln!("{}", err.kind());
            debug!("{}", err);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// Sets up the tracing subscriber on stderr, honouring RUST_LOG first
fn setup_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("github_acquaintances_lib=info,warn"),
        _ => EnvFilter::new("github_acquaintances_lib=debug,info"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
