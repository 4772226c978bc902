//! Single-assignment deferred results with chained handler stages.
//!
//! A [`Deferred`] is a slot for a value that does not exist yet. Callers attach
//! stages, each an optional success handler paired with an optional failure
//! handler, and the slot is settled exactly once. Settlement drains the stages
//! synchronously and in attachment order: each stage receives the previous
//! stage's output, successes travel the success path, failures the failure
//! path. A stage with no handler for the arriving variant passes it through.
//!
//! ```text
//! settle(Ok(v)) -> [on_success?] -> [on_success?] -> ... -> result
//!                        |                |
//! settle(Err(f)) -> [on_failure?] -> [on_failure?] -> ... -> result
//! ```
//!
//! Stages attached after settlement run immediately with the known result.
//! No `RefCell` borrow is held while a handler runs, so handlers may attach
//! further stages (they join the current drain) or settle other deferreds.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use later_types::{Failure, SettleError};

/// The settled result of a deferred: a value or a failure.
pub type Outcome<T> = Result<T, Failure>;

pub type SuccessHandler<T> = Box<dyn FnOnce(T) -> Outcome<T>>;
pub type FailureHandler<T> = Box<dyn FnOnce(Failure) -> Outcome<T>>;

enum Stage<T> {
    Pair {
        on_success: Option<SuccessHandler<T>>,
        on_failure: Option<FailureHandler<T>>,
    },
    Both(Box<dyn FnOnce(Outcome<T>) -> Outcome<T>>),
    /// Sees the result without replacing it. A failure seen here has been
    /// handed to another chain and is no longer this chain's to report.
    Observe(Box<dyn FnOnce(&Outcome<T>)>),
}

struct Inner<T> {
    /// `None` while pending, and while a stage holds the result mid-drain.
    result: Option<Outcome<T>>,
    settled: bool,
    draining: bool,
    claimed: bool,
    stages: VecDeque<Stage<T>>,
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        if let Some(Err(failure)) = &self.result
            && !self.claimed
        {
            report_unhandled(failure);
        }
    }
}

/// A placeholder for a value that becomes available later.
///
/// `Deferred` is a cheap handle: clones share the same slot. It is
/// deliberately `!Send`; everything runs on the reactor's thread.
pub struct Deferred<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// Create a pending deferred.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                result: None,
                settled: false,
                draining: false,
                claimed: false,
                stages: VecDeque::new(),
            })),
        }
    }

    /// A deferred that has already succeeded with `value`.
    #[must_use]
    pub fn succeeded(value: T) -> Self {
        let deferred = Self::new();
        deferred.settle_or_log(Ok(value));
        deferred
    }

    /// A deferred that has already failed with `failure`.
    #[must_use]
    pub fn failed(failure: Failure) -> Self {
        let deferred = Self::new();
        deferred.settle_or_log(Err(failure));
        deferred
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.inner.borrow().settled
    }

    /// The chain's current result.
    ///
    /// Returns `None` while pending, and while one of this deferred's own
    /// handlers is running.
    #[must_use]
    pub fn result(&self) -> Option<Outcome<T>> {
        self.inner.borrow().result.clone()
    }

    /// Settle with `outcome` and drain every attached stage.
    ///
    /// Settlement is single-shot: a second attempt returns
    /// [`SettleError::AlreadySettled`] and leaves the first result untouched.
    pub fn settle(&self, outcome: Outcome<T>) -> Result<(), SettleError> {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.settled {
                return Err(SettleError::AlreadySettled);
            }
            tracing::debug!(
                success = outcome.is_ok(),
                stages = inner.stages.len(),
                "Deferred settled"
            );
            inner.settled = true;
            inner.result = Some(outcome);
        }
        self.drain();
        Ok(())
    }

    pub fn settle_success(&self, value: T) -> Result<(), SettleError> {
        self.settle(Ok(value))
    }

    pub fn settle_failure(&self, failure: impl Into<Failure>) -> Result<(), SettleError> {
        self.settle(Err(failure.into()))
    }

    /// Settle a pending deferred with a cancellation failure.
    ///
    /// Returns `false` if it had already settled. Stages attached before the
    /// cancellation receive the failure on their failure path.
    pub fn cancel(&self) -> bool {
        self.settle(Err(Failure::cancelled())).is_ok()
    }

    /// Register a stage of optional handlers.
    ///
    /// The returned handle observes the chained result, i.e. the output of the
    /// last stage attached to this deferred.
    pub fn attach(
        &self,
        on_success: Option<SuccessHandler<T>>,
        on_failure: Option<FailureHandler<T>>,
    ) -> Deferred<T> {
        self.push_stage(Stage::Pair {
            on_success,
            on_failure,
        })
    }

    pub fn add_callbacks<S, F>(&self, on_success: S, on_failure: F) -> Deferred<T>
    where
        S: FnOnce(T) -> Outcome<T> + 'static,
        F: FnOnce(Failure) -> Outcome<T> + 'static,
    {
        self.attach(Some(Box::new(on_success)), Some(Box::new(on_failure)))
    }

    /// Attach a success handler; failures pass through untouched.
    pub fn add_callback<S>(&self, on_success: S) -> Deferred<T>
    where
        S: FnOnce(T) -> Outcome<T> + 'static,
    {
        self.attach(Some(Box::new(on_success)), None)
    }

    /// Attach a failure handler; values pass through untouched.
    ///
    /// Returning `Ok` from the handler puts the chain back on the success path.
    pub fn add_errback<F>(&self, on_failure: F) -> Deferred<T>
    where
        F: FnOnce(Failure) -> Outcome<T> + 'static,
    {
        self.attach(None, Some(Box::new(on_failure)))
    }

    /// Attach one handler that runs for either variant.
    pub fn add_both<H>(&self, handler: H) -> Deferred<T>
    where
        H: FnOnce(Outcome<T>) -> Outcome<T> + 'static,
    {
        self.push_stage(Stage::Both(Box::new(handler)))
    }

    /// Continue the chain in a new deferred of another type.
    ///
    /// Exactly one of the handlers runs with the chain's result at this point,
    /// and its output settles the returned deferred. This chain keeps its
    /// result; a failure handed over this way is the new chain's to handle.
    pub fn then<U, S, F>(&self, on_success: S, on_failure: F) -> Deferred<U>
    where
        U: Clone + 'static,
        S: FnOnce(T) -> Outcome<U> + 'static,
        F: FnOnce(Failure) -> Outcome<U> + 'static,
    {
        let next = Deferred::new();
        let target = next.clone();
        self.observe(move |outcome| {
            let produced = match outcome.clone() {
                Ok(value) => on_success(value),
                Err(failure) => on_failure(failure),
            };
            target.settle_or_log(produced);
        });
        next
    }

    /// Settle `target` with a copy of this chain's result at this point.
    pub fn forward_to(&self, target: &Deferred<T>) -> Deferred<T> {
        let target = target.clone();
        self.observe(move |outcome| target.settle_or_log(outcome.clone()))
    }

    /// Run `handler` with the chain's result at this point, leaving it in
    /// place.
    ///
    /// A failure seen by an observer counts as handled: the observer has taken
    /// responsibility for it, so it is not reported when the chain is dropped.
    pub fn observe<H>(&self, handler: H) -> Deferred<T>
    where
        H: FnOnce(&Outcome<T>) + 'static,
    {
        self.push_stage(Stage::Observe(Box::new(handler)))
    }

    /// Settle, logging instead of failing when something else got there first.
    pub(crate) fn settle_or_log(&self, outcome: Outcome<T>) {
        if let Err(err) = self.settle(outcome) {
            tracing::warn!(%err, "Dropping result for a deferred that was settled elsewhere");
        }
    }

    fn push_stage(&self, stage: Stage<T>) -> Deferred<T> {
        self.inner.borrow_mut().stages.push_back(stage);
        self.drain();
        self.clone()
    }

    fn drain(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.settled || inner.draining {
                return;
            }
            inner.draining = true;
        }

        loop {
            let next = {
                let mut inner = self.inner.borrow_mut();
                if inner.stages.is_empty() || inner.result.is_none() {
                    inner.draining = false;
                    None
                } else {
                    inner.stages.pop_front().zip(inner.result.take())
                }
            };
            let Some((stage, outcome)) = next else {
                break;
            };

            let (outcome, claimed) = run_stage(stage, outcome);

            let mut inner = self.inner.borrow_mut();
            if let Some(claimed) = claimed {
                inner.claimed = claimed;
            }
            inner.result = Some(outcome);
        }
    }
}

/// Run one stage. The second value is the new "claimed" flag for the
/// failure, or `None` when the result passed through untouched.
fn run_stage<T>(stage: Stage<T>, outcome: Outcome<T>) -> (Outcome<T>, Option<bool>) {
    match (stage, outcome) {
        (
            Stage::Pair {
                on_success: Some(handler),
                ..
            },
            Ok(value),
        ) => (handler(value), Some(false)),
        (
            Stage::Pair {
                on_failure: Some(handler),
                ..
            },
            Err(failure),
        ) => (handler(failure), Some(false)),
        (Stage::Pair { .. }, passthrough) => (passthrough, None),
        (Stage::Both(handler), outcome) => (handler(outcome), Some(false)),
        (Stage::Observe(handler), outcome) => {
            handler(&outcome);
            let claimed = outcome.is_err().then_some(true);
            (outcome, claimed)
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Deferred")
                .field("settled", &inner.settled)
                .field("result", &inner.result)
                .field("stages", &inner.stages.len())
                .finish(),
            Err(_) => f.write_str("Deferred { <draining> }"),
        }
    }
}

// ============================================================================
// Unhandled failures
// ============================================================================

thread_local! {
    static UNHANDLED: RefCell<Option<Vec<Failure>>> = const { RefCell::new(None) };
}

fn report_unhandled(failure: &Failure) {
    tracing::error!(%failure, "Unhandled failure in deferred");
    let _ = UNHANDLED.try_with(|cell| {
        if let Ok(mut captured) = cell.try_borrow_mut()
            && let Some(failures) = captured.as_mut()
        {
            failures.push(failure.clone());
        }
    });
}

/// Records failures that reach the end of a chain without a handler.
///
/// Unhandled failures are always logged. While a capture is alive they are
/// also collected for the current thread, which lets tests assert that a
/// failure was not silently dropped. Captures do not nest.
#[derive(Debug)]
pub struct UnhandledFailures {
    _private: (),
}

impl UnhandledFailures {
    #[must_use]
    pub fn capture() -> Self {
        UNHANDLED.with(|cell| *cell.borrow_mut() = Some(Vec::new()));
        Self { _private: () }
    }

    /// Take the failures reported since the capture started (or since the
    /// last call).
    #[must_use]
    pub fn take(&self) -> Vec<Failure> {
        UNHANDLED.with(|cell| {
            cell.borrow_mut()
                .as_mut()
                .map(std::mem::take)
                .unwrap_or_default()
        })
    }
}

impl Drop for UnhandledFailures {
    fn drop(&mut self) {
        let _ = UNHANDLED.try_with(|cell| *cell.borrow_mut() = None);
    }
}
