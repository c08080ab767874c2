#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Metrics and tracing instrumentation for the GAH handle store.

/// Counter metrics.
pub mod counter;
/// Tracing utilities.
pub mod trace;

pub use counter::Counter;
