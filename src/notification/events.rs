use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::thread::ThreadId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ThreadResolved,
    ThreadConflict,
    ConsensusSuggested,
    ConsensusConfirmed,
    ConnectivityDegraded,
    SessionTimedOut,
    SessionCancelled,
    ReportDelivered,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThreadResolved => "thread.resolved",
            Self::ThreadConflict => "thread.conflict",
            Self::ConsensusSuggested => "consensus.suggested",
            Self::ConsensusConfirmed => "consensus.confirmed",
            Self::ConnectivityDegraded => "connectivity.degraded",
            Self::SessionTimedOut => "session.timed_out",
            Self::SessionCancelled => "session.cancelled",
            Self::ReportDelivered => "report.delivered",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::ThreadResolved => "🧵",
            Self::ThreadConflict => "⚠️",
            Self::ConsensusSuggested => "🤝",
            Self::ConsensusConfirmed => "✅",
            Self::ConnectivityDegraded => "📡",
            Self::SessionTimedOut => "⏱️",
            Self::SessionCancelled => "🚫",
            Self::ReportDelivered => "📝",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::ThreadConflict | Self::ConnectivityDegraded)
    }

    /// Events worth interrupting the operator for.
    pub fn is_desktop_worthy(&self) -> bool {
        !matches!(self, Self::ThreadResolved | Self::ReportDelivered)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionEvent {
    pub event_type: EventType,
    pub thread_id: Option<ThreadId>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DiscussionEvent {
    pub fn new(event_type: EventType, thread_id: Option<ThreadId>) -> Self {
        Self {
            event_type,
            thread_id,
            created_at: Utc::now(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn title(&self) -> String {
        format!(
            "{} discuss-pilot: {}",
            self.event_type.emoji(),
            self.event_type.as_str()
        )
    }

    pub fn body(&self) -> String {
        let mut parts = Vec::new();
        if let Some(id) = self.thread_id {
            parts.push(format!("Thread: #{}", id));
        }
        if let Some(msg) = &self.message {
            parts.push(msg.clone());
        }
        parts.join("\n")
    }

    /// Event log file stem: per thread, or `session` before a thread is known.
    pub fn log_name(&self) -> String {
        self.thread_id
            .map_or_else(|| "session".to_string(), |id| format!("thread-{}", id))
    }
}
