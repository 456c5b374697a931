//! Core domain types for Fusion.
//!
//! This crate contains pure types with no IO, no async, and minimal dependencies:
//! the terminal [`Outcome`] of an operation, the [`BridgeError`] taxonomy seen by
//! callers, and the per-call [`ConversionOptions`].

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod affinity;
mod errors;
mod ids;
mod outcome;

pub use affinity::{ContinuationAffinity, ConversionOptions};
pub use errors::{BridgeError, MisuseError};
pub use ids::OperationId;
pub use outcome::{OperationState, Outcome};
