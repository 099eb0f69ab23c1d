//! Core domain types for Tempo.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies:
//! outcome envelopes produced by the coordination primitives, validated policies,
//! and the error taxonomy shared by every primitive.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod error;
mod outcome;
mod policy;

pub use error::{AggregateError, ConfigurationError, DebounceError, RetryError, RunError};
pub use outcome::{Outcome, RaceWin};
pub use policy::{ConcurrencyLimit, RetryPolicy, SupersededPolicy};
