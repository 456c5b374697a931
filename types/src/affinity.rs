//! Per-call conversion options.

use serde::Deserialize;

/// Where the continuation after a bridged wait resumes.
///
/// Deserializes from a plain `bool`: `true` is [`CapturedContext`], `false` is
/// [`AnyContext`].
///
/// [`CapturedContext`]: ContinuationAffinity::CapturedContext
/// [`AnyContext`]: ContinuationAffinity::AnyContext
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(from = "bool")]
pub enum ContinuationAffinity {
    /// Re-queue the continuation through the scheduler that started the run.
    #[default]
    CapturedContext,
    /// Continue inline wherever completion was observed.
    AnyContext,
}

impl ContinuationAffinity {
    #[must_use]
    pub const fn from_flag(continue_on_captured_context: bool) -> Self {
        if continue_on_captured_context {
            ContinuationAffinity::CapturedContext
        } else {
            ContinuationAffinity::AnyContext
        }
    }

    #[must_use]
    pub const fn continue_on_captured_context(self) -> bool {
        matches!(self, ContinuationAffinity::CapturedContext)
    }
}

impl From<bool> for ContinuationAffinity {
    fn from(continue_on_captured_context: bool) -> Self {
        Self::from_flag(continue_on_captured_context)
    }
}

/// Options attached to a single conversion call. Never stored globally and
/// not inherited by further conversions of the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionOptions {
    pub affinity: ContinuationAffinity,
}

impl ConversionOptions {
    #[must_use]
    pub const fn configured(continue_on_captured_context: bool) -> Self {
        Self {
            affinity: ContinuationAffinity::from_flag(continue_on_captured_context),
        }
    }
}
