//! Core domain types for later.
//!
//! This crate contains pure domain types with no IO, no scheduling, and minimal
//! dependencies. Everything here can be used from any layer of the workspace.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod ids;
pub use ids::TimerId;

use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Failures
// ============================================================================

/// Why a deferred result failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FailureKind {
    /// The underlying operation reported an error.
    #[default]
    Operation,
    /// The deferred result was cancelled before it settled.
    Cancelled,
}

impl FailureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FailureKind::Operation => "operation",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

/// The failure variant of a settled deferred result.
///
/// Failures travel down the failure path of a chain until a handler converts
/// them back into a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    kind: FailureKind,
    reason: Cow<'static, str>,
}

impl Failure {
    /// An operation failure with the given reason.
    pub fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind: FailureKind::Operation,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self {
            kind: FailureKind::Cancelled,
            reason: Cow::Borrowed("deferred was cancelled"),
        }
    }

    #[must_use]
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind == FailureKind::Cancelled
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failure: {}", self.kind.as_str(), self.reason)
    }
}

impl std::error::Error for Failure {}

impl From<&'static str> for Failure {
    fn from(reason: &'static str) -> Self {
        Self::new(reason)
    }
}

impl From<String> for Failure {
    fn from(reason: String) -> Self {
        Self::new(reason)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Returned when a deferred result is settled more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SettleError {
    #[error("deferred has already been settled")]
    AlreadySettled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReactorError {
    #[error("reactor is already running")]
    AlreadyRunning,
}
