//! One-shot cooperative cancellation.
//!
//! A [`CancellationSource`] triggers; any number of [`CancellationSignal`]
//! clones observe. Both sides share one [`CancellationToken`]. Triggering is
//! irreversible.
//!
//! Signals are never derived implicitly. Work only sees a signal that was handed
//! to it.

use std::fmt;
use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Write side: the only thing that can trigger the signal.
#[derive(Clone, Default)]
pub struct CancellationSource {
    token: CancellationToken,
}

impl CancellationSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A read-only view to hand to work that should observe this source.
    #[must_use]
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            token: self.token.clone(),
        }
    }

    /// Trigger the signal. Later calls are no-ops.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            tracing::trace!("Cancellation triggered");
        }
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl fmt::Debug for CancellationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationSource")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Read side of a [`CancellationSource`]. Cannot trigger.
#[derive(Clone)]
pub struct CancellationSignal {
    token: CancellationToken,
}

impl CancellationSignal {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal is triggered. Resolves immediately if it
    /// already was.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Drive `work` until it finishes or the signal triggers, whichever comes
    /// first. `None` means the signal won and `work` was dropped.
    pub async fn run_until_cancelled<F: Future>(&self, work: F) -> Option<F::Output> {
        self.token.run_until_cancelled(work).await
    }
}

impl fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationSignal")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
