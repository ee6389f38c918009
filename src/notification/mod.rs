//! Discussion event notification system.
//!
//! - `DiscussionEvent`: Event types (thread resolved, consensus, degraded connectivity, etc.)
//! - `Notifier`: Desktop notification, per-thread event log and hook delivery

mod events;
mod notifier;

pub use events::{DiscussionEvent, EventType};
pub use notifier::Notifier;
