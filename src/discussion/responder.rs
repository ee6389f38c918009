use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::consensus::ConsensusState;
use super::investigator::Investigation;
use super::parser::ParsedComment;
use crate::error::{DiscussError, Result};
use crate::thread::ThreadId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// First message of the session.
    Opening,
    /// Reply to a batch of new comments.
    Reply,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Reply => "reply",
        }
    }
}

/// Everything a responder sees when asked for a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRequest {
    pub phase: Phase,
    pub thread_id: ThreadId,
    pub topic: String,
    pub comments: Vec<ParsedComment>,
    pub contexts: Vec<Investigation>,
    pub consensus: ConsensusState,
}

/// Decides what this agent says. `None` means stay silent.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, request: &ResponseRequest) -> Result<Option<String>>;
}

/// Monitor-only mode.
pub struct SilentResponder;

#[async_trait]
impl Responder for SilentResponder {
    async fn respond(&self, _request: &ResponseRequest) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Delegates to an external command: request JSON on stdin, reply body on stdout.
pub struct CommandResponder {
    command: String,
    timeout: Duration,
}

impl CommandResponder {
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Responder for CommandResponder {
    async fn respond(&self, request: &ResponseRequest) -> Result<Option<String>> {
        let payload = serde_json::to_vec(request)?;

        debug!(command = %self.command, phase = request.phase.as_str(), "Running responder");

        let mut child = Command::new("sh")
            .args(["-c", &self.command])
            .env("DISCUSS_THREAD", request.thread_id.to_string())
            .env("DISCUSS_TOPIC", &request.topic)
            .env("DISCUSS_PHASE", request.phase.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DiscussError::Responder(format!("failed to spawn responder: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A responder that ignores stdin closes the pipe early; that is not an error.
            if let Err(e) = stdin.write_all(&payload).await {
                debug!(error = %e, "Responder did not read request");
            }
        }

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                DiscussError::Responder(format!(
                    "responder timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                code = ?output.status.code(),
                stderr = %stderr.trim(),
                "Responder exited with failure; no reply"
            );
            return Ok(None);
        }

        let reply = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!reply.is_empty()).then_some(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ResponseRequest {
        ResponseRequest {
            phase: Phase::Reply,
            thread_id: 42,
            topic: "cache eviction".into(),
            comments: Vec::new(),
            contexts: Vec::new(),
            consensus: ConsensusState::Discussing,
        }
    }

    #[tokio::test]
    async fn test_silent_never_replies() {
        assert!(SilentResponder.respond(&request()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_command_reply_and_env() {
        let responder = CommandResponder::new(r#"cat >/dev/null; echo "thread $DISCUSS_THREAD $DISCUSS_PHASE""#);
        let reply = responder.respond(&request()).await.unwrap();
        assert_eq!(reply.as_deref(), Some("thread 42 reply"));
    }

    #[tokio::test]
    async fn test_command_receives_request_json() {
        let responder = CommandResponder::new("grep -o 'cache eviction' | head -n1");
        let reply = responder.respond(&request()).await.unwrap();
        assert_eq!(reply.as_deref(), Some("cache eviction"));
    }

    #[tokio::test]
    async fn test_failing_or_empty_command_is_silent() {
        assert!(CommandResponder::new("exit 3").respond(&request()).await.unwrap().is_none());
        assert!(CommandResponder::new("true").respond(&request()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_timeout_is_an_error() {
        let responder = CommandResponder::new("sleep 5").with_timeout(Duration::from_millis(50));
        assert!(matches!(
            responder.respond(&request()).await,
            Err(DiscussError::Responder(_))
        ));
    }
}
