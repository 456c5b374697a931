//! Conversions between eager operations and deferred computations.
//!
//! - [`to_deferred`]: wrap a running [`EagerOperation`] as a cold description
//!   that waits for it. Adds no cancellation of its own.
//! - [`to_eager`]: start a [`DeferredComputation`] now and hand back an eager
//!   handle. An explicit signal becomes the run's ambient context.
//! - `comp.await`: the awaiter bridge, `to_eager(&comp, None)` then await.
//!
//! A signal given to [`to_eager`] reaches the run's own checked suspension
//! points and nested deferred runs, nothing else. Eager operations the run
//! waits on stop only if they were created with the same signal, and a run
//! that never checks cannot be cancelled at all.

use std::future::IntoFuture;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::runtime::Handle;

use fusion_types::{BridgeError, ContinuationAffinity, ConversionOptions, MisuseError};

use crate::cancellation::CancellationSignal;
use crate::deferred::DeferredComputation;
use crate::eager::EagerOperation;

/// Describe waiting for `operation` as a deferred computation.
///
/// Returns immediately and starts nothing. Each run suspends until the
/// operation is terminal and yields its value, its exact error, or
/// `Cancelled`. Runs never consult the ambient signal while waiting, so if the
/// operation cannot be cancelled neither can the wait.
pub fn to_deferred<T, E>(
    operation: EagerOperation<T, E>,
    options: ConversionOptions,
) -> DeferredComputation<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    tracing::debug!(
        operation = %operation.id(),
        affinity = ?options.affinity,
        "Eager operation wrapped as deferred computation"
    );
    DeferredComputation::new(move |_ctx| resume(operation.clone(), options.affinity))
}

async fn resume<T, E>(
    operation: EagerOperation<T, E>,
    affinity: ContinuationAffinity,
) -> Result<T, BridgeError<E>>
where
    T: Clone,
    E: Clone,
{
    let outcome = operation.outcome().await?;
    if affinity.continue_on_captured_context() {
        // Re-queue through the scheduler polling this run rather than carrying
        // on inside the poll that observed completion.
        tokio::task::yield_now().await;
    }
    tracing::trace!(
        operation = %operation.id(),
        state = %outcome.state(),
        affinity = ?affinity,
        "Resuming after eager operation"
    );
    outcome.into_result()
}

/// Start `computation` now on the current tokio runtime.
///
/// With `signal`, the run uses it as its ambient context: the operation ends
/// `Cancelled` at the first suspension point of the run that checks it. A body
/// that never checks runs to completion. A signal that has already triggered
/// keeps the run from starting at all.
pub fn to_eager<T, E>(
    computation: &DeferredComputation<T, E>,
    signal: Option<CancellationSignal>,
) -> Result<EagerOperation<T, E>, MisuseError>
where
    T: Send + 'static,
    E: Send + 'static,
{
    let handle = Handle::try_current().map_err(|_| MisuseError::NoRuntime)?;
    if signal.as_ref().is_some_and(CancellationSignal::is_cancelled) {
        let operation = EagerOperation::cancelled();
        tracing::debug!(operation = %operation.id(), "Signal already triggered; run not started");
        return Ok(operation);
    }
    let operation = EagerOperation::launch(&handle, computation.run_with(signal));
    tracing::debug!(operation = %operation.id(), "Deferred computation started as eager operation");
    Ok(operation)
}

/// Conversions available on an eager handle.
pub trait EagerOperationExt<T, E> {
    /// [`to_deferred`] resuming on the captured context.
    fn as_deferred(&self) -> DeferredComputation<T, E>;

    /// [`to_deferred`] with explicit continuation affinity.
    fn as_deferred_configured(&self, continue_on_captured_context: bool) -> DeferredComputation<T, E>;
}

impl<T, E> EagerOperationExt<T, E> for EagerOperation<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn as_deferred(&self) -> DeferredComputation<T, E> {
        to_deferred(self.clone(), ConversionOptions::default())
    }

    fn as_deferred_configured(&self, continue_on_captured_context: bool) -> DeferredComputation<T, E> {
        to_deferred(
            self.clone(),
            ConversionOptions::configured(continue_on_captured_context),
        )
    }
}

/// Conversions available on a deferred computation.
pub trait DeferredComputationExt<T, E> {
    fn as_eager(&self) -> Result<EagerOperation<T, E>, MisuseError>;

    fn as_eager_with(&self, signal: &CancellationSignal) -> Result<EagerOperation<T, E>, MisuseError>;
}

impl<T, E> DeferredComputationExt<T, E> for DeferredComputation<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn as_eager(&self) -> Result<EagerOperation<T, E>, MisuseError> {
        to_eager(self, None)
    }

    fn as_eager_with(&self, signal: &CancellationSignal) -> Result<EagerOperation<T, E>, MisuseError> {
        to_eager(self, Some(signal.clone()))
    }
}

impl<T, E> IntoFuture for &DeferredComputation<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    type Output = Result<T, BridgeError<E>>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let started = to_eager(self, None);
        async move { started?.await }.boxed()
    }
}

impl<T, E> IntoFuture for DeferredComputation<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    type Output = Result<T, BridgeError<E>>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        (&self).into_future()
    }
}
