//! Page fetching through an opaque fetch capability.
//!
//! The orchestration here never looks inside a fetch: a [`Fetcher`] hands back
//! a deferred that settles exactly once, with a [`Page`] or a failure.
//! Results are recorded in a [`PageStore`] the caller owns, created before
//! dispatch and read once the reactor has drained every request.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use later_core::{Deferred, Failure, Outcome, Reactor, defer_later, gather};
use url::Url;

/// Line-oriented progress output for fetch orchestration.
pub type Notify = Rc<dyn Fn(String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    pub body: String,
}

/// An asynchronous operation that fetches a URL.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Deferred<Page>;
}

/// Reactor-driven fetcher with scripted outcomes.
///
/// Every request settles after the same latency. URLs that do not parse, and
/// URLs marked as failing, settle with a failure; everything else succeeds
/// with a small synthetic page.
#[derive(Debug, Clone)]
pub struct ScriptedFetcher {
    reactor: Reactor,
    latency: Duration,
    failing: HashSet<String>,
}

impl ScriptedFetcher {
    #[must_use]
    pub fn new(reactor: &Reactor, latency: Duration) -> Self {
        Self {
            reactor: reactor.clone(),
            latency,
            failing: HashSet::new(),
        }
    }

    /// Make requests for `url` fail.
    #[must_use]
    pub fn failing(mut self, url: impl Into<String>) -> Self {
        self.failing.insert(url.into());
        self
    }

    fn outcome_for(&self, url: &str) -> Outcome<Page> {
        let parsed = Url::parse(url).map_err(|err| Failure::new(format!("invalid URL `{url}`: {err}")))?;
        if self.failing.contains(url) {
            return Err(Failure::new(format!("connection to {parsed} refused")));
        }
        let host = parsed.host_str().unwrap_or("localhost");
        Ok(Page {
            url: url.to_string(),
            body: format!("<html><head><title>{host}</title></head></html>"),
        })
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch(&self, url: &str) -> Deferred<Page> {
        let outcome = self.outcome_for(url);
        tracing::debug!(url, succeeds = outcome.is_ok(), "Fetch dispatched");
        defer_later(&self.reactor, self.latency, move || outcome)
    }
}

/// Fetch results keyed by URL. `None` marks a failed fetch.
///
/// Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct PageStore {
    pages: Rc<RefCell<BTreeMap<String, Option<Page>>>>,
}

impl PageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, url: impl Into<String>, page: Option<Page>) {
        self.pages.borrow_mut().insert(url.into(), page);
    }

    /// `None` if `url` was never recorded, `Some(None)` if its fetch failed.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<Option<Page>> {
        self.pages.borrow().get(url).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.borrow().is_empty()
    }

    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.pages.borrow().values().filter(|p| p.is_some()).count()
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Option<Page>> {
        self.pages.borrow().clone()
    }
}

/// Request one page and record the result in `store`.
///
/// The stage pair reports success or failure through `notify`. A failed fetch
/// is converted into `None`, the placeholder stored and passed downstream in
/// place of a page, so the returned deferred only fails if a later stage does.
pub fn request_page(
    fetcher: &dyn Fetcher,
    url: &str,
    store: &PageStore,
    notify: &Notify,
) -> Deferred<Option<Page>> {
    let (ok_url, err_url, save_url) = (url.to_string(), url.to_string(), url.to_string());
    let (ok_notify, err_notify) = (Rc::clone(notify), Rc::clone(notify));
    let store = store.clone();

    fetcher
        .fetch(url)
        .then(
            move |page| {
                ok_notify(format!("Successfully downloaded `{ok_url}`."));
                Ok(Some(page))
            },
            move |failure| {
                tracing::warn!(url = %err_url, %failure, "Fetch failed");
                err_notify(format!("Failed to download `{err_url}`."));
                Ok(None)
            },
        )
        .add_callback(move |page| {
            store.record(save_url, page.clone());
            Ok(page)
        })
}

/// Request every URL and settle once all of them have been recorded.
pub fn request_pages(
    fetcher: &dyn Fetcher,
    urls: &[String],
    store: &PageStore,
    notify: &Notify,
) -> Deferred<Vec<Outcome<Option<Page>>>> {
    let requests = urls
        .iter()
        .map(|url| request_page(fetcher, url, store, notify))
        .collect();
    gather(requests)
}
