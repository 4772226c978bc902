//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use later_core::{Deferred, Outcome, Reactor};

/// Ordered record of what handlers observed.
#[derive(Debug, Clone, Default)]
pub struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// A success handler that records `tag:value` and passes the value on.
    pub fn passthrough<T>(&self, tag: &'static str) -> impl FnOnce(T) -> Outcome<T> + use<T>
    where
        T: std::fmt::Display,
    {
        let log = self.clone();
        move |value| {
            log.push(format!("{tag}:{value}"));
            Ok(value)
        }
    }
}

/// A reactor on virtual time, so delays cost nothing in tests.
pub fn virtual_reactor() -> Reactor {
    Reactor::with_virtual_clock()
}

/// Settle `deferred` with `value` once `delay` has elapsed on `reactor`.
pub fn settle_after<T>(reactor: &Reactor, delay: std::time::Duration, deferred: &Deferred<T>, value: T)
where
    T: Clone + 'static,
{
    let target = deferred.clone();
    reactor.schedule_after(delay, move || {
        target.settle_success(value).expect("settled once");
    });
}
