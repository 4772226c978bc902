//! Single-threaded cooperative reactor with timer scheduling.
//!
//! # Turn order
//!
//! Each turn of [`Reactor::run`] executes exactly one unit of work:
//!
//! 1. A stop request ends the loop (`RunOutcome::Stopped`)
//! 2. Otherwise the oldest queued call (`call_soon`) runs
//! 3. Otherwise the earliest timer is awaited and run
//! 4. With nothing left, the loop ends (`RunOutcome::Idle`)
//!
//! A unit runs to completion before the next one starts, so a settlement and
//! the full drain of its stages never interleave with other work.
//!
//! Timers fire no earlier than their delay, in deadline order, ties broken by
//! registration order. Cancelled timers stay in the heap until they reach the
//! top and are skipped there.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

use later_types::{ReactorError, TimerId};

use crate::deferred::{Deferred, Outcome};

type Action = Box<dyn FnOnce()>;

/// Why [`Reactor::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// [`Reactor::stop`] was called.
    Stopped,
    /// No queued calls and no pending timers remained.
    Idle,
}

#[derive(Debug)]
enum Clock {
    System { origin: Instant },
    Virtual { now: Duration },
}

impl Clock {
    fn now(&self) -> Duration {
        match self {
            Clock::System { origin } => origin.elapsed(),
            Clock::Virtual { now } => *now,
        }
    }

    fn wait_until(&mut self, deadline: Duration) {
        match self {
            Clock::System { origin } => {
                let now = origin.elapsed();
                if deadline > now {
                    std::thread::sleep(deadline - now);
                }
            }
            Clock::Virtual { now } => {
                if deadline > *now {
                    *now = deadline;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimerEntry {
    deadline: Duration,
    id: TimerId,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap: earliest deadline, then earliest registration
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct State {
    clock: Clock,
    ready: VecDeque<Action>,
    timers: BinaryHeap<TimerEntry>,
    actions: HashMap<TimerId, Action>,
    next_timer: u64,
    running: bool,
    stop_requested: bool,
}

enum Unit {
    Run(Action),
    Stop,
    Idle,
}

/// Handle to a single-threaded event loop.
///
/// Clones share the same loop, so callbacks can capture a handle to schedule
/// more work or stop the loop.
#[derive(Clone)]
pub struct Reactor {
    state: Rc<RefCell<State>>,
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

impl Reactor {
    /// A reactor on the system monotonic clock; waiting for a timer sleeps.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Clock::System {
            origin: Instant::now(),
        })
    }

    /// A reactor on virtual time: waiting for a timer jumps straight to its
    /// deadline.
    #[must_use]
    pub fn with_virtual_clock() -> Self {
        Self::with_clock(Clock::Virtual {
            now: Duration::ZERO,
        })
    }

    fn with_clock(clock: Clock) -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                clock,
                ready: VecDeque::new(),
                timers: BinaryHeap::new(),
                actions: HashMap::new(),
                next_timer: 0,
                running: false,
                stop_requested: false,
            })),
        }
    }

    /// Time elapsed since the reactor was created.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.state.borrow().clock.now()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    /// Number of timers that have neither fired nor been cancelled.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.state.borrow().actions.len()
    }

    /// Queue `action` to run on a later turn, ahead of any timer.
    pub fn call_soon<F>(&self, action: F)
    where
        F: FnOnce() + 'static,
    {
        self.state.borrow_mut().ready.push_back(Box::new(action));
    }

    /// Run `action` once at least `delay` has elapsed.
    pub fn schedule_after<F>(&self, delay: Duration, action: F) -> TimerId
    where
        F: FnOnce() + 'static,
    {
        let mut state = self.state.borrow_mut();
        let id = TimerId::new(state.next_timer);
        state.next_timer += 1;
        let deadline = state.clock.now().saturating_add(delay);
        state.timers.push(TimerEntry { deadline, id });
        state.actions.insert(id, Box::new(action));
        tracing::debug!(%id, delay_ms = delay.as_millis(), "Timer scheduled");
        id
    }

    /// Cancel a pending timer. Returns `false` if it already fired or was
    /// cancelled before.
    pub fn cancel_timer(&self, id: TimerId) -> bool {
        let cancelled = self.state.borrow_mut().actions.remove(&id).is_some();
        if cancelled {
            tracing::debug!(%id, "Timer cancelled");
        }
        cancelled
    }

    /// Ask a running loop to return once the current unit of work finishes.
    ///
    /// Has no effect when the loop is not running.
    pub fn stop(&self) {
        let mut state = self.state.borrow_mut();
        if state.running {
            state.stop_requested = true;
        } else {
            tracing::debug!("Ignoring stop request for an idle reactor");
        }
    }

    /// Run until stopped or out of work.
    ///
    /// Fails with [`ReactorError::AlreadyRunning`] when called from inside one
    /// of this reactor's callbacks. A loop that returned can be run again.
    pub fn run(&self) -> Result<RunOutcome, ReactorError> {
        let _guard = RunGuard::enter(&self.state)?;
        tracing::debug!("Reactor running");

        let outcome = loop {
            match self.next_unit() {
                Unit::Run(action) => action(),
                Unit::Stop => break RunOutcome::Stopped,
                Unit::Idle => break RunOutcome::Idle,
            }
        };

        tracing::debug!(?outcome, "Reactor finished");
        Ok(outcome)
    }

    fn next_unit(&self) -> Unit {
        let mut state = self.state.borrow_mut();
        if state.stop_requested {
            return Unit::Stop;
        }
        if let Some(action) = state.ready.pop_front() {
            return Unit::Run(action);
        }

        loop {
            let Some(&TimerEntry { deadline, id }) = state.timers.peek() else {
                return Unit::Idle;
            };
            if !state.actions.contains_key(&id) {
                state.timers.pop();
                continue;
            }
            state.clock.wait_until(deadline);
            if state.clock.now() < deadline {
                continue;
            }
            state.timers.pop();
            if let Some(action) = state.actions.remove(&id) {
                tracing::debug!(%id, "Timer fired");
                return Unit::Run(action);
            }
        }
    }
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.state.try_borrow() {
            Ok(state) => f
                .debug_struct("Reactor")
                .field("clock", &state.clock)
                .field("ready", &state.ready.len())
                .field("timers", &state.actions.len())
                .field("running", &state.running)
                .finish(),
            Err(_) => f.write_str("Reactor { <busy> }"),
        }
    }
}

/// Marks the reactor as running for the guard's lifetime, including when a
/// callback panics.
struct RunGuard<'a> {
    state: &'a RefCell<State>,
}

impl<'a> RunGuard<'a> {
    fn enter(state: &'a RefCell<State>) -> Result<Self, ReactorError> {
        let mut inner = state.borrow_mut();
        if inner.running {
            return Err(ReactorError::AlreadyRunning);
        }
        inner.running = true;
        inner.stop_requested = false;
        drop(inner);
        Ok(Self { state })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.running = false;
            state.stop_requested = false;
        }
    }
}

/// Run `produce` after `delay` and settle the returned deferred with its
/// result.
///
/// Cancelling the deferred before the delay elapses skips `produce`.
pub fn defer_later<T, F>(reactor: &Reactor, delay: Duration, produce: F) -> Deferred<T>
where
    T: Clone + 'static,
    F: FnOnce() -> Outcome<T> + 'static,
{
    let deferred = Deferred::new();
    let target = deferred.clone();
    reactor.schedule_after(delay, move || {
        if target.is_settled() {
            tracing::debug!("Skipping delayed call for a deferred that already settled");
            return;
        }
        target.settle_or_log(produce());
    });
    deferred
}
