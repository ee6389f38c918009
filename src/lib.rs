pub mod cli;
pub mod config;
pub mod discussion;
pub mod error;
pub mod git;
pub mod identity;
pub mod notification;
pub mod output;
pub mod retry;
pub mod signal;
pub mod thread;
pub mod utils;

pub use config::{DiscussConfig, ProjectPaths};
pub use discussion::{
    ConsensusDetector, ConsensusState, CursorTracker, DiscussionSession, Report, SessionOutcome,
    SessionRequest,
};
pub use error::{ApiError, DiscussError, Result};
pub use git::{GhRunner, GitRunner};
pub use identity::{AgentIdentity, IdentityProvider, LocalIdentity};
pub use retry::RetryPolicy;
pub use signal::SignalHandler;
pub use thread::{GhThreadService, ThreadHandle, ThreadLocator, ThreadService};
