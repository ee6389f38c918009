//! Shared utility functions.
//!
//! - String truncation (UTF-8 safe, boundary-aware)
//! - Sentence splitting and case-insensitive phrase matching

mod text;

pub use text::{
    contains_phrase, sentences, sentences_matching, truncate_at_boundary, truncate_with_marker,
};
