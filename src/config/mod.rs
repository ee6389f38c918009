//! Configuration types and loading.
//!
//! Provides all configuration structures for discuss-pilot:
//! - `DiscussConfig`: Top-level configuration with validation
//! - Per-concern sections: polling cadence, retry, consensus, mentions, reports
//! - `ProjectPaths`: On-disk layout under `.claude/discuss`

mod settings;

pub use settings::{
    ConsensusConfig, DISCUSS_DIR, DiscussConfig, ExhaustedPolicy, InvestigationConfig,
    MentionConfig, NotificationConfig, PollingConfig, ProjectPaths, ReportConfig, ResponderConfig,
    RetryConfig, SessionConfig, ThreadConfig,
};
