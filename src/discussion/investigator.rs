//! Local lookups for mentions raised in the thread.
//!
//! Files are read through [`FileReader`], functions searched through [`SymbolSearch`].
//! Nothing here is fatal: every miss or lookup error degrades to [`Investigation::Absent`].

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::mentions::{Mention, MentionKind};
use crate::config::InvestigationConfig;
use crate::error::{DiscussError, Result};
use crate::git::GitRunner;
use crate::utils::truncate_with_marker;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Context {
    File {
        path: String,
        content: String,
        truncated: bool,
    },
    Function {
        name: String,
        /// `path:line:text` rows.
        matches: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Investigation {
    Found(Context),
    Absent { mention: Mention, reason: String },
}

impl Investigation {
    pub fn context(&self) -> Option<&Context> {
        match self {
            Self::Found(ctx) => Some(ctx),
            Self::Absent { .. } => None,
        }
    }
}

#[async_trait]
pub trait FileReader: Send + Sync {
    /// At most `limit + 1` bytes, so callers can tell a file was cut without loading all of it.
    async fn read(&self, path: &str, limit: usize) -> Result<String>;
}

#[async_trait]
pub trait SymbolSearch: Send + Sync {
    async fn search_symbol(&self, name: &str, limit: usize) -> Result<Vec<String>>;
}

/// Read-only access to files below a repository root.
pub struct RepoFiles {
    root: PathBuf,
}

impl RepoFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve `path` under the root, rejecting anything that would escape it.
    pub async fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
        if escapes {
            return Err(DiscussError::FileSystemLookup {
                path: path.to_string(),
                reason: "path escapes repository root".into(),
            });
        }

        let lookup_err = |e: std::io::Error| DiscussError::FileSystemLookup {
            path: path.to_string(),
            reason: e.to_string(),
        };
        let root = fs::canonicalize(&self.root).await.map_err(lookup_err)?;
        let resolved = fs::canonicalize(root.join(relative))
            .await
            .map_err(lookup_err)?;

        // Symlinks may still point outside.
        if !resolved.starts_with(&root) {
            return Err(DiscussError::FileSystemLookup {
                path: path.to_string(),
                reason: "path escapes repository root".into(),
            });
        }
        Ok(resolved)
    }
}

#[async_trait]
impl FileReader for RepoFiles {
    async fn read(&self, path: &str, limit: usize) -> Result<String> {
        let resolved = self.resolve(path).await?;
        let lookup_err = |e: std::io::Error| DiscussError::FileSystemLookup {
            path: path.to_string(),
            reason: e.to_string(),
        };
        let file = fs::File::open(&resolved).await.map_err(lookup_err)?;
        let mut bytes = Vec::new();
        file.take(limit as u64 + 1)
            .read_to_end(&mut bytes)
            .await
            .map_err(lookup_err)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Function lookup through `git grep` over tracked files.
pub struct GitGrepSearch {
    git: GitRunner,
}

impl GitGrepSearch {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            git: GitRunner::new(root),
        }
    }
}

#[async_trait]
impl SymbolSearch for GitGrepSearch {
    async fn search_symbol(&self, name: &str, limit: usize) -> Result<Vec<String>> {
        // `Type::method` and `obj.method` are searched by their final segment; the
        // segments are identifiers, so no regex escaping is needed.
        let last = name.rsplit([':', '.']).next().unwrap_or(name);
        if last.is_empty() {
            return Ok(Vec::new());
        }
        self.git
            .grep(&format!("\\b{}[[:space:]]*\\(", last), limit)
            .await
    }
}

pub struct ContextInvestigator {
    files: Arc<dyn FileReader>,
    symbols: Arc<dyn SymbolSearch>,
    config: InvestigationConfig,
}

impl ContextInvestigator {
    pub fn new(
        files: Arc<dyn FileReader>,
        symbols: Arc<dyn SymbolSearch>,
        config: InvestigationConfig,
    ) -> Self {
        Self {
            files,
            symbols,
            config,
        }
    }

    /// Production wiring for a repository checkout.
    pub fn for_repo(root: &Path, config: InvestigationConfig) -> Self {
        Self::new(
            Arc::new(RepoFiles::new(root)),
            Arc::new(GitGrepSearch::new(root)),
            config,
        )
    }

    pub async fn investigate(&self, mention: &Mention) -> Investigation {
        let result = match mention.kind {
            MentionKind::File => self.read_file(&mention.value).await,
            MentionKind::Function => self.find_function(&mention.value).await,
            MentionKind::Signature => return absent(mention, "signatures are not investigated"),
        };

        match result {
            Ok(Some(ctx)) => Investigation::Found(ctx),
            Ok(None) => absent(mention, "no matches"),
            Err(e) => {
                debug!(mention = %mention.value, error = %e, "Lookup failed");
                absent(mention, &e.to_string())
            }
        }
    }

    /// Investigate every mention in order, skipping duplicates.
    pub async fn investigate_all<'a, I>(&self, mentions: I) -> Vec<Investigation>
    where
        I: IntoIterator<Item = &'a Mention>,
    {
        if !self.config.enabled {
            return Vec::new();
        }
        let mut seen: Vec<&Mention> = Vec::new();
        let mut out = Vec::new();
        for mention in mentions {
            if mention.kind == MentionKind::Signature || seen.contains(&mention) {
                continue;
            }
            seen.push(mention);
            out.push(self.investigate(mention).await);
        }
        out
    }

    async fn read_file(&self, path: &str) -> Result<Option<Context>> {
        let content = self.files.read(path, self.config.max_file_bytes).await?;
        let truncated = content.len() > self.config.max_file_bytes;
        Ok(Some(Context::File {
            path: path.to_string(),
            content: truncate_with_marker(&content, self.config.max_file_bytes),
            truncated,
        }))
    }

    async fn find_function(&self, name: &str) -> Result<Option<Context>> {
        let matches = self
            .symbols
            .search_symbol(name, self.config.max_matches)
            .await?;
        if matches.is_empty() {
            return Ok(None);
        }
        Ok(Some(Context::Function {
            name: name.to_string(),
            matches,
        }))
    }
}

fn absent(mention: &Mention, reason: &str) -> Investigation {
    debug!(kind = ?mention.kind, value = %mention.value, reason, "Mention absent");
    Investigation::Absent {
        mention: mention.clone(),
        reason: reason.to_string(),
    }
}
