//! Interop between eager operations and deferred computations.
//!
//! An [`EagerOperation`] is work that is already running on tokio. A
//! [`DeferredComputation`] is a cold description that runs only when asked and
//! carries an ambient cancellation signal into nested deferred work. The
//! [`bridge`] module converts between the two while keeping values, errors and
//! cancellation distinct.
//!
//! Cancellation never flows implicitly into eager work: an eager operation
//! stops on a [`CancellationSignal`] only if it was created with one.

pub mod bridge;
mod cancellation;
mod deferred;
mod eager;

pub use bridge::{DeferredComputationExt, EagerOperationExt, to_deferred, to_eager};
pub use cancellation::{CancellationSignal, CancellationSource};
pub use deferred::{DeferredComputation, RunContext};
pub use eager::{Completer, EagerOperation};

pub use fusion_types::{
    BridgeError, ContinuationAffinity, ConversionOptions, MisuseError, OperationId,
    OperationState, Outcome,
};
