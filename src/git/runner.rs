use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{ApiError, DiscussError, Result};

pub struct GitRunner {
    working_dir: PathBuf,
}

impl GitRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub async fn run(&self, args: &[&str]) -> Result<Output> {
        debug!(args = ?args, dir = %self.working_dir.display(), "Running git command");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(args = ?args, stderr = %stderr, "Git command failed");
        }

        Ok(output)
    }

    async fn run_stdout(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not a git repository") {
                return Err(DiscussError::NotInGitRepo);
            }
            return Err(DiscussError::Other(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub async fn current_branch(&self) -> Result<String> {
        let branch = self.run_stdout(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        if branch == "HEAD" {
            // Detached head: fall back to the short commit so the signature stays unique.
            return self.run_stdout(&["rev-parse", "--short", "HEAD"]).await;
        }
        Ok(branch)
    }

    pub async fn remote_url(&self, remote: &str) -> Result<String> {
        self.run_stdout(&["remote", "get-url", remote]).await
    }

    pub async fn toplevel(&self) -> Result<PathBuf> {
        self.run_stdout(&["rev-parse", "--show-toplevel"])
            .await
            .map(PathBuf::from)
    }

    /// `git grep` for an extended regex across tracked files.
    /// Returns `path:line:text` rows; no match is an empty list, not an error.
    pub async fn grep(&self, pattern: &str, limit: usize) -> Result<Vec<String>> {
        let output = self
            .run(&["grep", "-n", "-I", "-E", "-e", pattern])
            .await?;

        match output.status.code() {
            Some(0) => Ok(String::from_utf8_lossy(&output.stdout)
                .lines()
                .take(limit)
                .map(str::to_string)
                .collect()),
            Some(1) => Ok(Vec::new()),
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(DiscussError::Other(format!("git grep failed: {}", stderr.trim())))
            }
        }
    }
}

/// Thin wrapper around the GitHub CLI. Every call is bounded by `timeout` and failures are
/// classified into [`ApiError`] buckets so callers can decide whether to retry.
pub struct GhRunner {
    working_dir: PathBuf,
    timeout: Duration,
    repo: Option<String>,
}

impl GhRunner {
    pub fn new(working_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            working_dir: working_dir.into(),
            timeout,
            repo: None,
        }
    }

    /// Target an explicit `owner/name` instead of the repository inferred from the working dir.
    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    pub async fn run(&self, args: &[&str]) -> std::result::Result<String, ApiError> {
        let mut full: Vec<&str> = args.to_vec();
        if let Some(repo) = &self.repo {
            full.extend(["--repo", repo.as_str()]);
        }

        debug!(args = ?full, "Running gh command");

        let future = Command::new("gh")
            .args(&full)
            .current_dir(&self.working_dir)
            .env("GH_PROMPT_DISABLED", "1")
            .kill_on_drop(true)
            .output();

        let output = timeout(self.timeout, future)
            .await
            .map_err(|_| ApiError::Timeout {
                operation: format!("gh {}", args.first().copied().unwrap_or_default()),
                duration_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| ApiError::Other(format!("gh execution failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let err = ApiError::from_gh_output(&stderr);
            warn!(args = ?args, error = %err, "gh command failed");
            return Err(err);
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
