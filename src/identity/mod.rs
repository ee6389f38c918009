//! Local agent identity: hostname, branch and repository of the running process.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::{DiscussError, Result};
use crate::git::GitRunner;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub hostname: String,
    pub branch: String,
    pub repo_owner: String,
    pub repo_name: String,
}

impl AgentIdentity {
    pub fn new(
        hostname: impl Into<String>,
        branch: impl Into<String>,
        repo_owner: impl Into<String>,
        repo_name: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            branch: branch.into(),
            repo_owner: repo_owner.into(),
            repo_name: repo_name.into(),
        }
    }

    /// `owner/name`, the form `gh --repo` expects.
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.repo_owner, self.repo_name)
    }

    /// Exact host + branch equality, the rule for recognising our own signed comments.
    pub fn matches(&self, hostname: &str, branch: &str) -> bool {
        self.hostname == hostname && self.branch == branch
    }

    pub async fn resolve(provider: &dyn IdentityProvider) -> Result<Self> {
        let hostname = provider.hostname().await?;
        let branch = provider.current_branch().await?;
        let (repo_owner, repo_name) = provider.repository().await?;

        if hostname.is_empty() || branch.is_empty() {
            return Err(DiscussError::Identity(
                "hostname and branch must not be empty".into(),
            ));
        }

        let identity = Self {
            hostname,
            branch,
            repo_owner,
            repo_name,
        };
        debug!(identity = %identity, "Resolved agent identity");
        Ok(identity)
    }
}

impl fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} ({}/{})",
            self.hostname, self.branch, self.repo_owner, self.repo_name
        )
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn hostname(&self) -> Result<String>;
    async fn current_branch(&self) -> Result<String>;
    /// `(owner, name)` of the repository hosting the discussion threads.
    async fn repository(&self) -> Result<(String, String)>;
}

/// Identity derived from the machine and the git checkout at `root`.
pub struct LocalIdentity {
    git: GitRunner,
    remote: String,
}

impl LocalIdentity {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            git: GitRunner::new(root),
            remote: "origin".into(),
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn hostname(&self) -> Result<String> {
        if let Ok(output) = Command::new("hostname").output().await
            && output.status.success()
        {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !name.is_empty() {
                return Ok(name);
            }
        }

        if let Ok(name) = tokio::fs::read_to_string("/etc/hostname").await {
            let name = name.trim().to_string();
            if !name.is_empty() {
                return Ok(name);
            }
        }

        std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .map_err(|_| DiscussError::Identity("could not determine hostname".into()))
    }

    async fn current_branch(&self) -> Result<String> {
        self.git.current_branch().await
    }

    async fn repository(&self) -> Result<(String, String)> {
        let url = self.git.remote_url(&self.remote).await?;
        parse_remote_url(&url).ok_or_else(|| {
            DiscussError::Identity(format!("cannot parse owner/name from remote '{}'", url))
        })
    }
}

/// Extract `(owner, name)` from an ssh or https remote URL.
pub fn parse_remote_url(url: &str) -> Option<(String, String)> {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    let path = if let Some((_, rest)) = trimmed.split_once("://") {
        rest.split_once('/').map(|(_, p)| p)?
    } else {
        // scp-like: git@github.com:owner/name
        trimmed.split_once(':').map(|(_, p)| p)?
    };

    let mut parts = path.rsplitn(2, '/');
    let name = parts.next()?;
    let owner = parts.next()?.rsplit('/').next()?;

    if owner.is_empty() || name.is_empty() {
        return None;
    }
    Some((owner.to_string(), name.to_string()))
}
