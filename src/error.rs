use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

/// Classified failure of a single remote thread-service call.
///
/// The variants are bucketed by [`ApiError::is_transient`]: transient errors are
/// retried by the retry policy, everything else is returned to the caller at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Timeout {
        operation: String,
        duration_secs: u64,
    },
    RateLimited {
        retry_after_secs: Option<u64>,
    },
    /// 502/503/504 responses and dropped connections.
    Unavailable(String),
    Unauthorized(String),
    NotFound(String),
    ParseError(String),
    Other(String),
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::RateLimited { .. } | Self::Unavailable(_)
        )
    }

    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Classify a failed `gh` invocation from its stderr.
    /// Only unambiguous markers are treated as transient; anything unrecognised is permanent
    /// so that a broken invocation never loops forever. Status codes count only when they
    /// appear as `HTTP nnn`, never as bare digits (issue numbers, ports).
    pub fn from_gh_output(msg: &str) -> Self {
        let lower = msg.to_lowercase();
        let status = http_status(msg);
        let trimmed = msg.trim().to_string();

        if status == Some(429) || lower.contains("rate limit") {
            return Self::RateLimited {
                retry_after_secs: Self::extract_retry_after(&lower),
            };
        }
        if matches!(status, Some(401 | 403))
            || lower.contains("bad credentials")
            || lower.contains("authentication")
            || lower.contains("gh auth login")
        {
            return Self::Unauthorized(trimmed);
        }
        if status == Some(404)
            || lower.contains("could not resolve to an issue")
            || lower.contains("not found")
        {
            return Self::NotFound(trimmed);
        }
        if matches!(status, Some(500 | 502 | 503 | 504))
            || lower.contains("connection reset")
            || lower.contains("connection refused")
            || lower.contains("unexpected eof")
            || lower.contains("tls handshake")
        {
            return Self::Unavailable(trimmed);
        }
        if lower.contains("timed out") || lower.contains("timeout") {
            return Self::Timeout {
                operation: "gh".to_string(),
                duration_secs: 0,
            };
        }

        Self::Other(trimmed)
    }

    /// Server-requested delay, if any. The retry policy never waits less than its own backoff.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    fn extract_retry_after(lower: &str) -> Option<u64> {
        for pattern in ["retry after ", "retry-after: ", "retry_after="] {
            if let Some(idx) = lower.find(pattern) {
                let num: String = lower[idx + pattern.len()..]
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                if let Ok(secs) = num.parse() {
                    return Some(secs);
                }
            }
        }
        None
    }
}

fn http_status(msg: &str) -> Option<u16> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\bHTTP (\d{3})\b").unwrap())
        .captures(msg)
        .and_then(|c| c[1].parse().ok())
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout {
                operation,
                duration_secs,
            } => write!(f, "Timeout after {}s: {}", duration_secs, operation),
            Self::RateLimited { retry_after_secs } => match retry_after_secs {
                Some(secs) => write!(f, "Rate limited, retry after {}s", secs),
                None => write!(f, "Rate limited"),
            },
            Self::Unavailable(msg) => write!(f, "Service unavailable: {}", msg),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::ParseError(msg) => write!(f, "Parse error: {}", msg),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Error, Debug)]
pub enum DiscussError {
    #[error("Network error (transient): {0}")]
    TransientNetwork(ApiError),

    #[error("Remote API error: {0}")]
    PermanentApi(ApiError),

    #[error("Connectivity degraded: {operation} failed {attempts} times in a row ({last})")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last: ApiError,
    },

    #[error("Malformed comment {comment_id}: {reason}")]
    Parse { comment_id: String, reason: String },

    #[error(
        "Duplicate thread #{created} conflicts with existing #{existing} and could not be closed: {reason}"
    )]
    ThreadCreationConflict {
        existing: String,
        created: String,
        reason: String,
    },

    #[error("File lookup failed for {path}: {reason}")]
    FileSystemLookup { path: String, reason: String },

    #[error("Identity resolution failed: {0}")]
    Identity(String),

    #[error("Responder failed: {0}")]
    Responder(String),

    #[error("Report delivery failed: {0}")]
    Report(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not in a git repository")]
    NotInGitRepo,

    #[error("Discussion cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl DiscussError {
    /// Errors that end the discussion session instead of being absorbed by the monitor loop.
    pub fn halts_session(&self) -> bool {
        matches!(
            self,
            Self::PermanentApi(_)
                | Self::ThreadCreationConflict { .. }
                | Self::RetriesExhausted { .. }
                | Self::Identity(_)
                | Self::Config(_)
                | Self::NotInGitRepo
        )
    }
}

impl From<ApiError> for DiscussError {
    fn from(err: ApiError) -> Self {
        if err.is_transient() {
            DiscussError::TransientNetwork(err)
        } else {
            DiscussError::PermanentApi(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, DiscussError>;
