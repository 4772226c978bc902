//! Deferred results and the single-threaded reactor that drives them.
//!
//! Everything in this crate runs on one thread. A [`Deferred`] is settled
//! exactly once, either by an external operation completing or by a timer
//! firing on the [`Reactor`], and settlement drains its handler stages
//! synchronously within the reactor's current turn.

mod combinators;
pub mod deferred;
pub mod reactor;

pub use combinators::gather;
pub use deferred::{Deferred, FailureHandler, Outcome, SuccessHandler, UnhandledFailures};
pub use reactor::{Reactor, RunOutcome, defer_later};

pub use later_types::{Failure, FailureKind, ReactorError, SettleError, TimerId};
