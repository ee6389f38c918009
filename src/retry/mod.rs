//! Exponential backoff for remote thread-service calls.
//!
//! - `RetryPolicy`: transient/permanent split, capped doubling delays, degraded signal
//! - `RetryState`: per-operation attempt counter, reset on success
//! - `Sleeper`: the suspension used while backing off

mod policy;
mod sleeper;

pub use policy::{DegradedHook, DegradedNotice, RetryError, RetryPolicy, RetryState};
pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};
