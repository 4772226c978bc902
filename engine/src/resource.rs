//! Resources whose value becomes available asynchronously.
//!
//! A [`LazyResource`] lets callers ask for a value before it exists. Requests
//! made before readiness are parked as stages on one internal deferred; the
//! single settlement of that deferred delivers to all of them, in request
//! order. Requests made afterwards are served from the cached value.
//!
//! Transitions: Uninitialized -> Initializing -> Ready (or Failed)

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use later_core::{Deferred, Failure, Outcome, Reactor, defer_later};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("resource initialization has already started")]
    AlreadyInitializing,
}

/// Observable phase of a [`LazyResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

enum Phase<T> {
    /// Requests may already wait on `ready`; nothing produces the value yet.
    Uninitialized { ready: Deferred<T> },
    Initializing { ready: Deferred<T> },
    Ready(T),
    Failed(Failure),
}

impl<T> Phase<T> {
    fn state(&self) -> ResourceState {
        match self {
            Phase::Uninitialized { .. } => ResourceState::Uninitialized,
            Phase::Initializing { .. } => ResourceState::Initializing,
            Phase::Ready(_) => ResourceState::Ready,
            Phase::Failed(_) => ResourceState::Failed,
        }
    }
}

/// A value that is produced once, asynchronously, and then cached.
///
/// Each [`get_value`](Self::get_value) call returns a fresh deferred, so every
/// caller gets exactly one delivery regardless of whether it asked before or
/// after the value was ready.
pub struct LazyResource<T> {
    name: Rc<str>,
    phase: Rc<RefCell<Phase<T>>>,
}

impl<T> Clone for LazyResource<T> {
    fn clone(&self) -> Self {
        Self {
            name: Rc::clone(&self.name),
            phase: Rc::clone(&self.phase),
        }
    }
}

impl<T: Clone + 'static> LazyResource<T> {
    /// An uninitialized resource. Call [`initialize`](Self::initialize) to
    /// start producing its value.
    #[must_use]
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        let name = name.into();
        let ready = Deferred::new();
        let phase = Rc::new(RefCell::new(Phase::Uninitialized {
            ready: ready.clone(),
        }));

        // Attached before any waiter, so the value is cached before the
        // first delivery.
        ready.observe(Self::finish(Rc::clone(&name), Rc::downgrade(&phase)));

        Self { name, phase }
    }

    /// A resource whose value `source` will produce.
    #[must_use]
    pub fn from_deferred(name: impl Into<Rc<str>>, source: &Deferred<T>) -> Self {
        let resource = Self::new(name);
        if let Err(err) = resource.initialize(source) {
            tracing::error!(%err, "Fresh resource refused initialization");
        }
        resource
    }

    /// A resource whose value `produce` computes once `delay` has elapsed on
    /// `reactor`.
    #[must_use]
    pub fn with_delay<F>(
        name: impl Into<Rc<str>>,
        reactor: &Reactor,
        delay: Duration,
        produce: F,
    ) -> Self
    where
        F: FnOnce() -> Outcome<T> + 'static,
    {
        Self::from_deferred(name, &defer_later(reactor, delay, produce))
    }

    /// Start initialization from `source`.
    ///
    /// The internal deferred settles with whatever `source` settles with,
    /// exactly once. Fails if initialization already started.
    pub fn initialize(&self, source: &Deferred<T>) -> Result<(), ResourceError> {
        let ready = {
            let mut phase = self.phase.borrow_mut();
            let ready = match &*phase {
                Phase::Uninitialized { ready } => ready.clone(),
                _ => return Err(ResourceError::AlreadyInitializing),
            };
            *phase = Phase::Initializing {
                ready: ready.clone(),
            };
            ready
        };
        tracing::info!(resource = %self.name, "Resource initializing");
        source.forward_to(&ready);
        Ok(())
    }

    /// Ask for the value.
    ///
    /// Already settled when the resource is ready (or failed); otherwise it
    /// settles in the same drain that completes initialization.
    #[must_use]
    pub fn get_value(&self) -> Deferred<T> {
        let ready = match &*self.phase.borrow() {
            Phase::Ready(value) => return Deferred::succeeded(value.clone()),
            Phase::Failed(failure) => return Deferred::failed(failure.clone()),
            Phase::Uninitialized { ready } | Phase::Initializing { ready } => ready.clone(),
        };
        tracing::debug!(resource = %self.name, "Parking request until the resource is ready");
        let waiter = Deferred::new();
        ready.forward_to(&waiter);
        waiter
    }

    #[must_use]
    pub fn state(&self) -> ResourceState {
        self.phase.borrow().state()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == ResourceState::Ready
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn finish(
        name: Rc<str>,
        phase: Weak<RefCell<Phase<T>>>,
    ) -> impl FnOnce(&Outcome<T>) + 'static {
        move |outcome| {
            let Some(phase) = phase.upgrade() else {
                return;
            };
            // Replacing the phase retires the internal deferred.
            *phase.borrow_mut() = match outcome {
                Ok(value) => {
                    tracing::info!(resource = %name, "Resource ready");
                    Phase::Ready(value.clone())
                }
                Err(failure) => {
                    tracing::warn!(resource = %name, %failure, "Resource initialization failed");
                    Phase::Failed(failure.clone())
                }
            };
        }
    }
}

impl<T> std::fmt::Debug for LazyResource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.phase.try_borrow().map(|phase| phase.state());
        f.debug_struct("LazyResource")
            .field("name", &self.name)
            .field("state", &state.ok())
            .finish()
    }
}
