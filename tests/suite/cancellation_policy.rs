//! Where cancellation reaches, and where it does not.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;

use fusion_core::{
    CancellationSource, DeferredComputation, DeferredComputationExt, EagerOperation,
    EagerOperationExt, OperationState, Outcome,
};

use crate::common::{ANSWER, AppError, WORK_DELAY, init_tracing};

fn counting(runs: &Arc<AtomicUsize>) -> DeferredComputation<u32, AppError> {
    let runs = Arc::clone(runs);
    DeferredComputation::from_fallible(move || {
        runs.fetch_add(1, Ordering::SeqCst);
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(ANSWER)
        }
    })
}

#[tokio::test]
async fn trigger_before_start_prevents_the_run() {
    init_tracing();
    let runs = Arc::new(AtomicUsize::new(0));
    let source = CancellationSource::new();
    source.cancel();

    let operation = counting(&runs).as_eager_with(&source.signal()).unwrap();
    assert!(operation.await.unwrap_err().is_cancelled());
    tokio::task::yield_now().await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn trigger_after_completion_changes_nothing() {
    let runs = Arc::new(AtomicUsize::new(0));
    let source = CancellationSource::new();

    let operation = counting(&runs).as_eager_with(&source.signal()).unwrap();
    assert_eq!(operation.wait().await, OperationState::Succeeded);

    source.cancel();
    assert_eq!(operation.state(), OperationState::Succeeded);
    assert_eq!(operation.await.unwrap(), ANSWER);
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let source = CancellationSource::new();
    let signal = source.signal();
    source.cancel();
    source.cancel();
    assert!(signal.is_cancelled());
    assert!(source.is_cancelled());
}

#[tokio::test]
async fn wrapped_operation_ignores_the_ambient_signal() {
    init_tracing();
    let (inner, completer) = EagerOperation::<u32, AppError>::pending();
    let source = CancellationSource::new();

    // The deferred wait has no suspension point of its own that consults the
    // signal.
    let run = tokio::spawn(inner.as_deferred().run_with(Some(source.signal())));
    tokio::time::sleep(Duration::from_millis(20)).await;
    source.cancel();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!run.is_finished());

    completer.succeed(ANSWER);
    assert_eq!(run.await.expect("run task").unwrap(), ANSWER);
}

#[tokio::test]
async fn body_that_never_checks_runs_to_completion() {
    init_tracing();
    let runs = Arc::new(AtomicUsize::new(0));
    let source = CancellationSource::new();

    let operation = counting(&runs).as_eager_with(&source.signal()).unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    source.cancel();

    assert_eq!(operation.wait().await, OperationState::Succeeded);
    assert_eq!(operation.await.unwrap(), ANSWER);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn wrapped_wait_finishes_only_with_the_wrapped_operation() {
    let (inner, completer) = EagerOperation::<u32, AppError>::pending();
    let source = CancellationSource::new();
    let outer = inner.as_deferred().as_eager_with(&source.signal()).unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    source.cancel();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(outer.state(), OperationState::Running);

    completer.cancel();
    assert_eq!(outer.wait().await, OperationState::Cancelled);
}

#[tokio::test]
async fn dropped_producer_cancels_waiters() {
    let (operation, completer) = EagerOperation::<u32, AppError>::pending();
    let computation = operation.as_deferred_configured(false);
    let waiter = tokio::spawn(computation.run());

    drop(completer);
    let err = waiter.await.expect("waiter task").unwrap_err();
    assert!(err.is_cancelled());
    assert!(matches!(operation.try_outcome(), Some(Ok(Outcome::Cancelled))));
}

#[tokio::test]
async fn cancelled_and_failed_stay_distinct() {
    let source = CancellationSource::new();
    let failing = DeferredComputation::<u32, AppError>::fail(AppError::new("bad request"));
    let sleeping = DeferredComputation::<(), AppError>::sleep(WORK_DELAY);

    let failed = failing.as_eager_with(&source.signal()).unwrap();
    assert_eq!(failed.wait().await, OperationState::Failed);

    let cancelled = sleeping.as_eager_with(&source.signal()).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    source.cancel();
    assert_eq!(cancelled.wait().await, OperationState::Cancelled);

    let failed = failed.await.unwrap_err();
    let cancelled = cancelled.await.unwrap_err();
    assert!(failed.is_failed() && !failed.is_cancelled());
    assert!(cancelled.is_cancelled() && !cancelled.is_failed());
}
