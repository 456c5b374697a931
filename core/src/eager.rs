//! Eager operations: hot work running on tokio, observed through a handle.
//!
//! An [`EagerOperation`] is a cloneable, non-owning view of a completion cell.
//! The work behind it was started when the operation was created; holding or
//! dropping handles never affects it. The cell settles exactly once.
//!
//! Two ways to read the result:
//! - [`EagerOperation::outcome`] clones it and can be repeated by any number
//!   of observers.
//! - [`EagerOperation::take`] (and `.await` on the handle) moves it out. Only
//!   one consuming waiter gets it; later ones get
//!   [`MisuseError::OutcomeAlreadyTaken`].

use std::fmt;
use std::future::{Future, IntoFuture};
use std::mem;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::Notify;

use fusion_types::{BridgeError, MisuseError, OperationId, OperationState, Outcome};

use crate::cancellation::CancellationSignal;

type Continuation = Box<dyn FnOnce(OperationState) + Send + 'static>;

enum Slot<T, E> {
    Running,
    Complete(Outcome<T, E>),
    /// The work itself ended in API misuse; reported to every waiter.
    Misused(MisuseError),
    Taken(OperationState),
}

impl<T, E> Slot<T, E> {
    fn state(&self) -> OperationState {
        match self {
            Slot::Running => OperationState::Running,
            Slot::Complete(outcome) => outcome.state(),
            Slot::Misused(_) => OperationState::Failed,
            Slot::Taken(state) => *state,
        }
    }
}

struct Inner<T, E> {
    slot: Slot<T, E>,
    continuations: Vec<Continuation>,
}

struct Shared<T, E> {
    id: OperationId,
    inner: Mutex<Inner<T, E>>,
    notify: Notify,
}

impl<T, E> Shared<T, E> {
    fn lock(&self) -> MutexGuard<'_, Inner<T, E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// First settle wins. Returns `false` if the cell was already terminal.
    fn settle(&self, slot: Slot<T, E>) -> bool {
        let (state, continuations) = {
            let mut inner = self.lock();
            if !matches!(inner.slot, Slot::Running) {
                return false;
            }
            inner.slot = slot;
            (inner.slot.state(), mem::take(&mut inner.continuations))
        };

        // The slot write above happens-before every woken waiter's read.
        self.notify.notify_waiters();
        tracing::debug!(operation = %self.id, state = %state, "Operation settled");
        for continuation in continuations {
            continuation(state);
        }
        true
    }

    fn settle_result(&self, result: Result<T, BridgeError<E>>) -> bool {
        let slot = match result {
            Ok(value) => Slot::Complete(Outcome::Succeeded(value)),
            Err(BridgeError::Failed(err)) => Slot::Complete(Outcome::Failed(err)),
            Err(BridgeError::Cancelled) => Slot::Complete(Outcome::Cancelled),
            Err(BridgeError::Misuse(misuse)) => Slot::Misused(misuse),
        };
        self.settle(slot)
    }
}

/// Handle to hot, already-running work producing `T` or failing with `E`.
pub struct EagerOperation<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for EagerOperation<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> EagerOperation<T, E> {
    /// An operation settled by hand through the returned [`Completer`].
    #[must_use]
    pub fn pending() -> (Self, Completer<T, E>) {
        let shared = Arc::new(Shared {
            id: OperationId::next(),
            inner: Mutex::new(Inner {
                slot: Slot::Running,
                continuations: Vec::new(),
            }),
            notify: Notify::new(),
        });
        let completer = Completer {
            shared: Arc::clone(&shared),
            settled: false,
        };
        (Self { shared }, completer)
    }

    /// An operation that already completed with `outcome`.
    #[must_use]
    pub fn from_outcome(outcome: Outcome<T, E>) -> Self {
        let (operation, completer) = Self::pending();
        completer.complete(outcome);
        operation
    }

    #[must_use]
    pub fn ready(value: T) -> Self {
        Self::from_outcome(Outcome::Succeeded(value))
    }

    #[must_use]
    pub fn failed(err: E) -> Self {
        Self::from_outcome(Outcome::Failed(err))
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self::from_outcome(Outcome::Cancelled)
    }

    #[must_use]
    pub fn id(&self) -> OperationId {
        self.shared.id
    }

    #[must_use]
    pub fn state(&self) -> OperationState {
        self.shared.lock().slot.state()
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Suspend until the operation is terminal and report how it ended.
    pub async fn wait(&self) -> OperationState {
        loop {
            let mut notified = pin!(self.shared.notify.notified());
            notified.as_mut().enable();
            let state = self.state();
            if state.is_terminal() {
                return state;
            }
            notified.await;
        }
    }

    /// Run `continuation` once the operation is terminal.
    ///
    /// Runs immediately, on this thread, if it already is. Otherwise it runs on
    /// whichever thread settles the operation.
    pub fn on_complete<F>(&self, continuation: F)
    where
        F: FnOnce(OperationState) + Send + 'static,
    {
        let state = {
            let mut inner = self.shared.lock();
            let state = inner.slot.state();
            if !state.is_terminal() {
                inner.continuations.push(Box::new(continuation));
                return;
            }
            state
        };
        continuation(state);
    }

    /// Suspend until terminal, then move the outcome out.
    pub async fn take(&self) -> Result<Outcome<T, E>, MisuseError> {
        loop {
            if let Some(taken) = self.try_take() {
                return taken;
            }
            self.wait().await;
        }
    }

    fn try_take(&self) -> Option<Result<Outcome<T, E>, MisuseError>> {
        let mut inner = self.shared.lock();
        let state = match &inner.slot {
            Slot::Running => return None,
            Slot::Misused(misuse) => return Some(Err(misuse.clone())),
            Slot::Taken(_) => {
                return Some(Err(MisuseError::OutcomeAlreadyTaken {
                    operation: self.shared.id,
                }));
            }
            Slot::Complete(outcome) => outcome.state(),
        };
        match mem::replace(&mut inner.slot, Slot::Taken(state)) {
            Slot::Complete(outcome) => Some(Ok(outcome)),
            other => {
                inner.slot = other;
                None
            }
        }
    }
}

impl<T: Clone, E: Clone> EagerOperation<T, E> {
    /// The outcome if terminal, without waiting. Repeatable.
    #[must_use]
    pub fn try_outcome(&self) -> Option<Result<Outcome<T, E>, MisuseError>> {
        match &self.shared.lock().slot {
            Slot::Running => None,
            Slot::Complete(outcome) => Some(Ok(outcome.clone())),
            Slot::Misused(misuse) => Some(Err(misuse.clone())),
            Slot::Taken(_) => Some(Err(MisuseError::OutcomeAlreadyTaken {
                operation: self.shared.id,
            })),
        }
    }

    /// Suspend until terminal, then clone the outcome. Every call observes the
    /// same outcome.
    pub async fn outcome(&self) -> Result<Outcome<T, E>, MisuseError> {
        loop {
            if let Some(outcome) = self.try_outcome() {
                return outcome;
            }
            self.wait().await;
        }
    }
}

impl<T, E> EagerOperation<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Start `work` on the current tokio runtime.
    pub fn spawn<F>(work: F) -> Result<Self, MisuseError>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|_| MisuseError::NoRuntime)?;
        Ok(Self::spawn_on(&handle, work))
    }

    pub fn spawn_on<F>(handle: &Handle, work: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::launch(handle, work.map(|result| result.map_err(BridgeError::Failed)))
    }

    /// Start work that observes `signal`.
    ///
    /// `work` receives the signal so it can hand it on to anything it starts.
    /// The operation itself observes the signal too: triggering it drops the
    /// work at its current suspension point and cancels the operation. If the
    /// signal has already triggered, the work is never polled.
    pub fn spawn_cancellable<F, Fut>(signal: &CancellationSignal, work: F) -> Result<Self, MisuseError>
    where
        F: FnOnce(CancellationSignal) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|_| MisuseError::NoRuntime)?;
        let work = work(signal.clone());
        Ok(Self::launch_cancellable(
            &handle,
            signal,
            work.map(|result| result.map_err(BridgeError::Failed)),
        ))
    }

    pub(crate) fn launch<F>(handle: &Handle, work: F) -> Self
    where
        F: Future<Output = Result<T, BridgeError<E>>> + Send + 'static,
    {
        let (operation, completer) = Self::pending();
        tracing::debug!(operation = %operation.id(), "Eager operation started");
        handle.spawn(async move {
            let result = work.await;
            completer.settle(result);
        });
        operation
    }

    fn launch_cancellable<F>(handle: &Handle, signal: &CancellationSignal, work: F) -> Self
    where
        F: Future<Output = Result<T, BridgeError<E>>> + Send + 'static,
    {
        if signal.is_cancelled() {
            let operation = Self::cancelled();
            tracing::debug!(
                operation = %operation.id(),
                "Signal already triggered; work not started"
            );
            return operation;
        }

        let signal = signal.clone();
        let (operation, completer) = Self::pending();
        tracing::debug!(operation = %operation.id(), "Cancellable eager operation started");
        handle.spawn(async move {
            let result = signal
                .run_until_cancelled(work)
                .await
                .unwrap_or(Err(BridgeError::Cancelled));
            completer.settle(result);
        });
        operation
    }
}

/// `handle.await` moves the result out, as [`EagerOperation::take`] does.
impl<T, E> IntoFuture for EagerOperation<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    type Output = Result<T, BridgeError<E>>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        async move { self.take().await?.into_result() }.boxed()
    }
}

impl<T, E> fmt::Debug for EagerOperation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerOperation")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

/// Write side of an operation created with [`EagerOperation::pending`].
///
/// Dropping it without settling cancels the operation, so waiters are never
/// left hanging when the producer goes away (including by panic).
pub struct Completer<T, E> {
    shared: Arc<Shared<T, E>>,
    settled: bool,
}

impl<T, E> Completer<T, E> {
    /// A handle to the operation this completer settles.
    #[must_use]
    pub fn operation(&self) -> EagerOperation<T, E> {
        EagerOperation {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Settle with `outcome`. Returns `false` if the operation was already
    /// terminal; nothing changes in that case.
    pub fn complete(mut self, outcome: Outcome<T, E>) -> bool {
        self.settled = true;
        self.shared.settle(Slot::Complete(outcome))
    }

    pub fn succeed(self, value: T) -> bool {
        self.complete(Outcome::Succeeded(value))
    }

    pub fn fail(self, err: E) -> bool {
        self.complete(Outcome::Failed(err))
    }

    pub fn cancel(self) -> bool {
        self.complete(Outcome::Cancelled)
    }

    pub(crate) fn settle(mut self, result: Result<T, BridgeError<E>>) -> bool {
        self.settled = true;
        self.shared.settle_result(result)
    }
}

impl<T, E> Drop for Completer<T, E> {
    fn drop(&mut self) {
        if !self.settled && self.shared.settle(Slot::Complete(Outcome::Cancelled)) {
            tracing::warn!(
                operation = %self.shared.id,
                "Completer dropped before settling; operation cancelled"
            );
        }
    }
}

impl<T, E> fmt::Debug for Completer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("operation", &self.shared.id)
            .field("settled", &self.settled)
            .finish()
    }
}
