//! Terminal observers for crawl events and the final result table.

use chrono::{DateTime, Local};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::crawler::Tally;
use crate::events::{Event, EventKind, Supervisor};
use crate::pagination::API_SEARCH_LIMIT;

/// Remembers the latest reset timestamp being waited for.
///
/// Every concurrent waiter reports its own start and end, so repeated
/// events for the same reset boundary are collapsed here.
#[derive(Debug, Default)]
pub struct WaitTracker {
    active: Mutex<i64>,
}

impl WaitTracker {
    /// True when `reset` is later than anything already waited for.
    pub fn start(&self, reset: i64) -> bool {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if reset > *active {
            *active = reset;
            true
        } else {
            false
        }
    }

    /// True when the wait for the newest reset is over.
    pub fn end(&self, reset: i64) -> bool {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if reset == *active && reset != 0 {
            *active = 0;
            true
        } else {
            false
        }
    }
}

fn format_reset(reset: i64) -> String {
    DateTime::from_timestamp(reset, 0)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| reset.to_string())
}

fn truncation_notice(total: u64) -> Option<String> {
    (total > API_SEARCH_LIMIT).then(|| {
        format!(
            "{} issue(s) will be processed (due to API limits, although there are {} issues)",
            API_SEARCH_LIMIT, total
        )
    })
}

fn attach_skip_report(supervisor: &mut Supervisor) {
    let skipped = Arc::new(AtomicUsize::new(0));

    let counter = skipped.clone();
    supervisor.on(EventKind::Skip, move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    for kind in [EventKind::FinishOk, EventKind::FinishError] {
        let skipped = skipped.clone();
        supervisor.on(kind, move |_| {
            let n = skipped.load(Ordering::Relaxed);
            if n > 0 {
                eprintln!("{} error(s) 404 skipped", n);
            }
        });
    }
}

/// Draw a progress bar advancing once per processed issue.
pub fn attach_progress_bar(supervisor: &mut Supervisor) -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("Processing issues:  {bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("\u{2588}\u{2588}\u{2591}"),
    );

    let bar = pb.clone();
    supervisor.on(EventKind::SearchPage, move |event| {
        if let Event::SearchPage { page, number: 1 } = event {
            let total = page.total_count.unwrap_or(0);
            if let Some(notice) = truncation_notice(total) {
                bar.println(notice);
            }
            bar.set_length(total.min(API_SEARCH_LIMIT));
        }
    });

    let bar = pb.clone();
    supervisor.on(EventKind::Issue, move |_| bar.inc(1));

    let tracker = Arc::new(WaitTracker::default());
    let (bar, waits) = (pb.clone(), tracker.clone());
    supervisor.on(EventKind::WaitStart, move |event| {
        if let Event::WaitStart { reset } = event {
            if waits.start(*reset) {
                bar.set_message(format!("(waiting [{}])", format_reset(*reset)));
            }
        }
    });
    let (bar, waits) = (pb.clone(), tracker);
    supervisor.on(EventKind::WaitEnd, move |event| {
        if let Event::WaitEnd { reset } = event {
            if waits.end(*reset) {
                bar.set_message("");
            }
        }
    });

    for kind in [EventKind::FinishOk, EventKind::FinishError] {
        let bar = pb.clone();
        supervisor.on(kind, move |_| bar.finish());
    }

    attach_skip_report(supervisor);
    pb
}

/// Print short status lines as the crawl progresses.
pub fn attach_info_messages(supervisor: &mut Supervisor) {
    supervisor.on(EventKind::SearchPage, |event| {
        if let Event::SearchPage { page, number: 1 } = event {
            let total = page.total_count.unwrap_or(0);
            match truncation_notice(total) {
                Some(notice) => eprintln!("{}", notice),
                None => eprintln!("{} issue(s) to be processed...", total),
            }
        }
    });

    let tracker = Arc::new(WaitTracker::default());
    let waits = tracker.clone();
    supervisor.on(EventKind::WaitStart, move |event| {
        if let Event::WaitStart { reset } = event {
            if waits.start(*reset) {
                eprintln!("Waiting for API rate limit reset until {}", format_reset(*reset));
            }
        }
    });
    supervisor.on(EventKind::WaitEnd, move |event| {
        if let Event::WaitEnd { reset } = event {
            if tracker.end(*reset) {
                eprintln!("Resuming working after wait");
            }
        }
    });

    attach_skip_report(supervisor);
}

/// Render the tally as an aligned `name = count` table.
pub fn format_tally(tally: &Tally) -> String {
    if tally.is_empty() {
        return "No results to print...".to_string();
    }

    let ranked = tally.ranked();
    let name_width = ranked.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    let count_width = ranked
        .iter()
        .map(|(_, count)| count.to_string().len())
        .max()
        .unwrap_or(0);

    ranked
        .iter()
        .map(|(name, count)| {
            format!(
                "{:<nw$} = {:>cw$}",
                name,
                count,
                nw = name_width,
                cw = count_width
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_tracker_collapses_repeated_waits() {
        let tracker = WaitTracker::default();
        assert!(tracker.start(100));
        assert!(!tracker.start(100));
        assert!(!tracker.start(90));
        assert!(!tracker.end(90));
        assert!(tracker.end(100));
        assert!(!tracker.end(100));
    }

    #[test]
    fn test_wait_tracker_follows_newer_reset() {
        let tracker = WaitTracker::default();
        assert!(tracker.start(100));
        assert!(tracker.start(200));
        assert!(!tracker.end(100));
        assert!(tracker.end(200));
    }

    #[test]
    fn test_format_tally_aligns_columns() {
        let tally: Tally = [("bob", 4), ("carol", 12), ("al", 4)].into_iter().collect();
        assert_eq!(format_tally(&tally), "carol = 12\nal    =  4\nbob   =  4");
    }

    #[test]
    fn test_format_empty_tally() {
        assert_eq!(format_tally(&Tally::default()), "No results to print...");
    }

    #[test]
    fn test_truncation_notice_only_above_limit() {
        assert!(truncation_notice(1000).is_none());
        assert!(truncation_notice(1001).unwrap().contains("although there are 1001 issues"));
    }
}
