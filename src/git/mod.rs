//! Git and GitHub CLI operations.
//!
//! Provides command execution wrappers:
//! - `GitRunner`: Git queries (branch, remote, grep)
//! - `GhRunner`: GitHub CLI calls with timeouts and error classification

mod runner;

pub use runner::{GhRunner, GitRunner};
