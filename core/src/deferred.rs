//! Deferred computations: cold, reusable descriptions of async work.
//!
//! Nothing happens when a [`DeferredComputation`] is built, cloned or passed
//! around. Each [`run`](DeferredComputation::run) is a new, independent
//! execution in the caller's task.
//!
//! A run carries an ambient [`RunContext`]. Its optional cancellation signal
//! flows into nested deferred runs started through [`RunContext::run`], and is
//! checked at the native suspension points ([`RunContext::sleep`],
//! [`RunContext::checkpoint`]). It is never handed to eager operations
//! implicitly.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use tokio::runtime::Runtime;

use fusion_types::{BridgeError, ConversionOptions, OperationId};

use crate::bridge::to_deferred;
use crate::cancellation::CancellationSignal;
use crate::eager::EagerOperation;

type Body<T, E> = dyn Fn(RunContext) -> BoxFuture<'static, Result<T, BridgeError<E>>> + Send + Sync;

/// Ambient context of a single deferred run.
#[derive(Debug, Clone)]
pub struct RunContext {
    id: OperationId,
    signal: Option<CancellationSignal>,
}

impl RunContext {
    fn new(signal: Option<CancellationSignal>) -> Self {
        Self {
            id: OperationId::next(),
            signal,
        }
    }

    #[must_use]
    pub fn id(&self) -> OperationId {
        self.id
    }

    /// The ambient signal, if the run was started with one.
    #[must_use]
    pub fn signal(&self) -> Option<&CancellationSignal> {
        self.signal.as_ref()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.signal.as_ref().is_some_and(CancellationSignal::is_cancelled)
    }

    /// Fail with `Cancelled` if the ambient signal has triggered.
    pub fn checkpoint<E>(&self) -> Result<(), BridgeError<E>> {
        if self.is_cancelled() {
            tracing::debug!(run = %self.id, "Cancelled at checkpoint");
            return Err(BridgeError::Cancelled);
        }
        Ok(())
    }

    /// Native delay. Ends early with `Cancelled` when the ambient signal
    /// triggers.
    pub async fn sleep<E>(&self, duration: Duration) -> Result<(), BridgeError<E>> {
        let Some(signal) = &self.signal else {
            tokio::time::sleep(duration).await;
            return Ok(());
        };
        tokio::select! {
            biased;
            () = signal.cancelled() => {
                tracing::debug!(run = %self.id, "Cancelled during sleep");
                Err(BridgeError::Cancelled)
            }
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Run a nested computation under this run's ambient signal.
    pub fn run<U, E>(
        &self,
        computation: &DeferredComputation<U, E>,
    ) -> impl Future<Output = Result<U, BridgeError<E>>> + Send + use<U, E>
    where
        U: Send + 'static,
        E: Send + 'static,
    {
        computation.run_with(self.signal.clone())
    }

    /// Wait for an eager operation from inside a run.
    ///
    /// The ambient signal is checked before waiting but is not passed to the
    /// operation: if it should stop the operation, the operation has to be
    /// created with that signal.
    pub fn await_eager<U, E>(
        &self,
        operation: &EagerOperation<U, E>,
    ) -> impl Future<Output = Result<U, BridgeError<E>>> + Send + use<U, E>
    where
        U: Clone + Send + 'static,
        E: Clone + Send + 'static,
    {
        self.run(&to_deferred(operation.clone(), ConversionOptions::default()))
    }
}

/// Cold description of async work producing `T` or failing with `E`.
pub struct DeferredComputation<T, E> {
    body: Arc<Body<T, E>>,
}

impl<T, E> Clone for DeferredComputation<T, E> {
    fn clone(&self) -> Self {
        Self {
            body: Arc::clone(&self.body),
        }
    }
}

impl<T, E> fmt::Debug for DeferredComputation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredComputation").finish_non_exhaustive()
    }
}

impl<T, E> DeferredComputation<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Describe a computation. `body` is invoked once per run.
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: Fn(RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BridgeError<E>>> + Send + 'static,
    {
        Self {
            body: Arc::new(move |ctx| body(ctx).boxed()),
        }
    }

    /// Describe a computation that only knows application errors.
    pub fn from_fallible<F, Fut>(work: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::new(move |_ctx| work().map(|result| result.map_err(BridgeError::Failed)))
    }

    #[must_use]
    pub fn value(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::new(move |_ctx| future::ready(Ok(value.clone())))
    }

    #[must_use]
    pub fn fail(err: E) -> Self
    where
        E: Clone + Sync,
    {
        Self::new(move |_ctx| future::ready(Err(BridgeError::Failed(err.clone()))))
    }

    /// Transform the value within the same run.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> DeferredComputation<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        DeferredComputation::new(move |ctx| {
            let body = Arc::clone(&self.body);
            let f = Arc::clone(&f);
            async move { body(ctx).await.map(|value| f(value)) }
        })
    }

    /// Sequence a computation built from this one's value. The second
    /// computation runs under the same ambient signal.
    #[must_use]
    pub fn and_then<U, F>(self, f: F) -> DeferredComputation<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> DeferredComputation<U, E> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        DeferredComputation::new(move |ctx| {
            let body = Arc::clone(&self.body);
            let f = Arc::clone(&f);
            async move {
                let value = body(ctx.clone()).await?;
                let next = f(value);
                ctx.checkpoint::<E>()?;
                (next.body)(ctx).await
            }
        })
    }

    /// Start a run with no ambient signal.
    pub fn run(&self) -> impl Future<Output = Result<T, BridgeError<E>>> + Send + use<T, E> {
        self.run_with(None)
    }

    /// Start a run with `signal` as its ambient cancellation context.
    ///
    /// A signal that has already triggered prevents the body from starting.
    pub fn run_with(
        &self,
        signal: Option<CancellationSignal>,
    ) -> impl Future<Output = Result<T, BridgeError<E>>> + Send + use<T, E> {
        let body = Arc::clone(&self.body);
        async move {
            let ctx = RunContext::new(signal);
            if ctx.is_cancelled() {
                tracing::debug!(run = %ctx.id, "Ambient signal already triggered; run not started");
                return Err(BridgeError::Cancelled);
            }
            tracing::trace!(run = %ctx.id, cancellable = ctx.signal.is_some(), "Deferred run started");
            body(ctx).await
        }
    }

    /// Block the current thread on `runtime` until a run completes.
    ///
    /// For harnesses and synchronous entry points only. Panics if called from
    /// within an async context, like [`Runtime::block_on`].
    pub fn run_synchronously(
        &self,
        runtime: &Runtime,
        signal: Option<CancellationSignal>,
    ) -> Result<T, BridgeError<E>> {
        runtime.block_on(self.run_with(signal))
    }
}

impl<E: Send + 'static> DeferredComputation<(), E> {
    #[must_use]
    pub fn sleep(duration: Duration) -> Self {
        Self::new(move |ctx| async move { ctx.sleep::<E>(duration).await })
    }
}
