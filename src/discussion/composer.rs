use chrono::{DateTime, SecondsFormat, Utc};

use crate::identity::AgentIdentity;

/// Signs outgoing messages with the agent footer that `CommentBatchParser` recognises.
pub struct ResponseComposer;

impl ResponseComposer {
    pub fn compose(body: &str, identity: &AgentIdentity, timestamp: DateTime<Utc>) -> String {
        format!(
            "{}\n\n{}",
            body.trim_end(),
            Self::signature(identity, timestamp)
        )
    }

    pub fn signature(identity: &AgentIdentity, timestamp: DateTime<Utc>) -> String {
        format!(
            "---\n**Agent**: `{}` | **Branch**: `{}` | **Timestamp**: `{}`",
            identity.hostname,
            identity.branch,
            timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}
