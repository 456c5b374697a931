use thiserror::Error;

use crate::ids::OperationId;

/// Error surfaced to whoever awaits a bridged operation.
///
/// `Failed` carries the application error value as the work produced it, never
/// wrapped or re-typed. Consuming waits move that value out. Wrapping an eager
/// operation as a deferred computation hands each run a clone, so errors that
/// need shared identity should be cheap to clone, e.g. behind an `Arc`.
#[derive(Debug, Error)]
pub enum BridgeError<E> {
    #[error("{0}")]
    Failed(E),
    #[error("operation was cancelled")]
    Cancelled,
    #[error(transparent)]
    Misuse(#[from] MisuseError),
}

impl<E> BridgeError<E> {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BridgeError::Cancelled)
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, BridgeError::Failed(_))
    }

    #[must_use]
    pub fn is_misuse(&self) -> bool {
        matches!(self, BridgeError::Misuse(_))
    }

    /// The application error, if this is a failure.
    pub fn into_failure(self) -> Option<E> {
        match self {
            BridgeError::Failed(err) => Some(err),
            BridgeError::Cancelled | BridgeError::Misuse(_) => None,
        }
    }
}

/// API misuse. Reported immediately, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MisuseError {
    #[error("outcome of {operation} was already taken by another waiter")]
    OutcomeAlreadyTaken { operation: OperationId },
    #[error("no async runtime is running on this thread")]
    NoRuntime,
}
