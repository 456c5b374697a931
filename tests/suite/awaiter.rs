//! Awaiting deferred computations directly from async code.

use pretty_assertions::assert_eq;

use fusion_core::{
    BridgeError, DeferredComputation, EagerOperation, EagerOperationExt, OperationState,
};

use crate::common::{ANSWER, AppError, WORK_DELAY, delay_and_fail, delay_and_return, init_tracing};

#[tokio::test]
async fn sleep_awaiter() {
    init_tracing();
    DeferredComputation::<(), AppError>::sleep(WORK_DELAY).await.unwrap();
}

#[tokio::test]
async fn value_awaiter() {
    init_tracing();
    let operation = EagerOperation::spawn(delay_and_return()).unwrap();

    let result = operation.as_deferred().await.unwrap();
    assert_eq!(result, ANSWER);
}

#[tokio::test]
async fn awaiting_by_reference_runs_each_time() {
    let computation = DeferredComputation::<u32, AppError>::new(|ctx| async move {
        Ok(u32::try_from(ctx.id().value()).unwrap_or(u32::MAX))
    });

    let first = (&computation).await.unwrap();
    let second = (&computation).await.unwrap();
    assert_ne!(first, second);
}

#[tokio::test]
async fn awaiter_keeps_error_identity() {
    let original = AppError::new("connection reset");
    let operation = EagerOperation::spawn(delay_and_fail(original.clone())).unwrap();

    match operation.as_deferred().await {
        Err(BridgeError::Failed(observed)) => assert!(observed.is_same(&original)),
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn awaiter_surfaces_cancellation() {
    let operation = EagerOperation::<u32, AppError>::cancelled();
    let err = operation.as_deferred().await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(err.into_failure().is_none());
}

#[tokio::test]
async fn awaiter_leaves_wrapped_operation_readable() {
    let operation = EagerOperation::spawn(delay_and_return()).unwrap();
    let computation = operation.as_deferred();

    assert_eq!((&computation).await.unwrap(), ANSWER);
    assert_eq!(operation.state(), OperationState::Succeeded);
    assert_eq!(computation.await.unwrap(), ANSWER);
}
