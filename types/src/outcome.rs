//! Terminal outcomes and the per-operation state machine.
//!
//! Every bridged operation moves `Running -> {Succeeded, Failed, Cancelled}`
//! exactly once. Cancellation is its own variant so callers can never mistake
//! it for an application failure.

use std::fmt;

use crate::errors::BridgeError;

/// The terminal result of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    Succeeded(T),
    Failed(E),
    Cancelled,
}

impl<T, E> Outcome<T, E> {
    #[must_use]
    pub fn state(&self) -> OperationState {
        match self {
            Outcome::Succeeded(_) => OperationState::Succeeded,
            Outcome::Failed(_) => OperationState::Failed,
            Outcome::Cancelled => OperationState::Cancelled,
        }
    }

    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U, E> {
        match self {
            Outcome::Succeeded(value) => Outcome::Succeeded(f(value)),
            Outcome::Failed(err) => Outcome::Failed(err),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }

    #[must_use]
    pub fn as_ref(&self) -> Outcome<&T, &E> {
        match self {
            Outcome::Succeeded(value) => Outcome::Succeeded(value),
            Outcome::Failed(err) => Outcome::Failed(err),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }

    /// Convert into the caller-facing `Result`, keeping the error kind.
    pub fn into_result(self) -> Result<T, BridgeError<E>> {
        match self {
            Outcome::Succeeded(value) => Ok(value),
            Outcome::Failed(err) => Err(BridgeError::Failed(err)),
            Outcome::Cancelled => Err(BridgeError::Cancelled),
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Succeeded(value),
            Err(err) => Outcome::Failed(err),
        }
    }
}

/// Observable lifecycle state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationState {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl OperationState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, OperationState::Running)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            OperationState::Running => "running",
            OperationState::Succeeded => "succeeded",
            OperationState::Failed => "failed",
            OperationState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
