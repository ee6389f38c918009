//! Structured command output.
//!
//! - `OutputWriter`: Text or JSON emission of session results
//! - `SessionOutput`: JSON shape of a finished discussion session

mod writer;

pub use writer::{OutputWriter, SessionOutput};
