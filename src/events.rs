//! Progress events fired by the crawler.
//!
//! The crawler only knows about [`EventSink`]. Observers such as a progress
//! bar register callbacks on a [`Supervisor`], which is built per crawl and
//! handed to the crawler.

use reqwest::header::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;

use crate::pagination::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SearchPage,
    Issue,
    Comment,
    WaitStart,
    WaitEnd,
    Skip,
    FinishOk,
    FinishError,
}

#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// A page of search results, before its issues are processed.
    SearchPage { page: &'a Page, number: u32 },
    /// An issue whose comment pages have all been processed.
    Issue(&'a Value),
    Comment(&'a Value),
    /// A request hit the rate limit and is about to sleep until `reset`.
    WaitStart { reset: i64 },
    WaitEnd { reset: i64 },
    /// A not-found response was suppressed.
    Skip { headers: &'a HeaderMap },
    FinishOk,
    FinishError,
}

impl Event<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::SearchPage { .. } => EventKind::SearchPage,
            Event::Issue(_) => EventKind::Issue,
            Event::Comment(_) => EventKind::Comment,
            Event::WaitStart { .. } => EventKind::WaitStart,
            Event::WaitEnd { .. } => EventKind::WaitEnd,
            Event::Skip { .. } => EventKind::Skip,
            Event::FinishOk => EventKind::FinishOk,
            Event::FinishError => EventKind::FinishError,
        }
    }
}

/// Receiver of crawl events. Called from many concurrent fetches.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event<'_>);
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &Event<'_>) {}
}

pub type Callback = Box<dyn Fn(&Event<'_>) + Send + Sync>;

/// Named callback lists, invoked in registration order.
///
/// Subscriptions are made before the crawl starts; an `Arc<Supervisor>` is
/// then shared with the crawler. Callbacks that keep state must synchronise
/// it themselves since events arrive from concurrent fetches.
#[derive(Default)]
pub struct Supervisor {
    callbacks: HashMap<EventKind, Vec<Callback>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Supervisor::default()
    }

    pub fn on<F>(&mut self, kind: EventKind, callback: F)
    where
        F: Fn(&Event<'_>) + Send + Sync + 'static,
    {
        self.callbacks
            .entry(kind)
            .or_default()
            .push(Box::new(callback));
    }

    pub fn subscribers(&self, kind: EventKind) -> usize {
        self.callbacks.get(&kind).map_or(0, Vec::len)
    }
}

impl EventSink for Supervisor {
    fn emit(&self, event: &Event<'_>) {
        if let Some(callbacks) = self.callbacks.get(&event.kind()) {
            for callback in callbacks {
                callback(event);
            }
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<_, _> = self.callbacks.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("Supervisor").field("callbacks", &counts).finish()
    }
}
