use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{DiscussError, Result};

/// Directory (relative to the repository root) holding config, checkpoints and reports.
pub const DISCUSS_DIR: &str = ".claude/discuss";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscussConfig {
    pub polling: PollingConfig,
    pub retry: RetryConfig,
    pub session: SessionConfig,
    pub consensus: ConsensusConfig,
    pub mentions: MentionConfig,
    pub investigation: InvestigationConfig,
    pub thread: ThreadConfig,
    pub responder: ResponderConfig,
    pub report: ReportConfig,
    pub notification: NotificationConfig,
}

impl DiscussConfig {
    pub async fn load(discuss_dir: &Path) -> Result<Self> {
        let config_path = discuss_dir.join("config.toml");
        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).await?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, discuss_dir: &Path) -> Result<()> {
        self.validate()?;
        fs::create_dir_all(discuss_dir).await?;
        let config_path = discuss_dir.join("config.toml");
        let content =
            toml::to_string_pretty(self).map_err(|e| DiscussError::Config(e.to_string()))?;
        fs::write(&config_path, content).await?;
        Ok(())
    }

    /// Validate configuration values for consistency and safety.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.polling.interval_secs == 0 {
            errors.push("polling.interval_secs must be greater than 0");
        }
        if self.polling.per_call_timeout_secs == 0 {
            errors.push("polling.per_call_timeout_secs must be greater than 0");
        }

        if self.retry.base_delay_secs == 0 {
            errors.push("retry.base_delay_secs must be greater than 0");
        }
        if self.retry.max_delay_secs < self.retry.base_delay_secs {
            errors.push("retry.max_delay_secs must be >= retry.base_delay_secs");
        }
        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be greater than 0");
        }

        if self.session.max_monitoring_secs == 0 {
            errors.push("session.max_monitoring_secs must be greater than 0");
        }

        // A single voice agreeing with itself is not consensus.
        if self.consensus.min_distinct_authors < 2 {
            errors.push("consensus.min_distinct_authors must be >= 2");
        }
        if self.consensus.phrases.iter().all(|p| p.trim().is_empty()) {
            errors.push("consensus.phrases must contain at least one phrase");
        }

        if self
            .mentions
            .file_patterns
            .iter()
            .any(|ext| ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            errors.push("mentions.file_patterns must be bare alphanumeric extensions (e.g. \"py\")");
        }

        if self.thread.match_threshold <= 0.0 || self.thread.match_threshold > 1.0 {
            errors.push("thread.match_threshold must be in (0.0, 1.0]");
        }

        if let Some(cmd) = &self.responder.command
            && cmd.trim().is_empty()
        {
            errors.push("responder.command must not be blank when set");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DiscussError::Config(errors.join("; ")))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    /// Bound on each individual remote call, independent of cadence and backoff.
    pub per_call_timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            per_call_timeout_secs: 20,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn per_call_timeout(&self) -> Duration {
        Duration::from_secs(self.per_call_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedPolicy {
    /// Keep retrying at the maximum delay until cancelled.
    #[default]
    Persist,
    /// Hand the failure back to the session, which halts.
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
    pub max_attempts: u32,
    pub on_exhausted: ExhaustedPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: 30,
            max_delay_secs: 300,
            max_attempts: 5,
            on_exhausted: ExhaustedPolicy::Persist,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_monitoring_secs: u64,
    /// Also hand this agent's own comments to the responder.
    pub respond_to_self: bool,
    /// Persist the cursor after every committed batch.
    pub checkpoint: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_monitoring_secs: 7200,
            respond_to_self: false,
            checkpoint: true,
        }
    }
}

impl SessionConfig {
    pub fn max_monitoring(&self) -> Duration {
        Duration::from_secs(self.max_monitoring_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub phrases: Vec<String>,
    pub min_distinct_authors: usize,
    pub disagreement_phrases: Vec<String>,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            phrases: Self::default_phrases(),
            min_distinct_authors: 2,
            disagreement_phrases: vec![
                "I disagree".into(),
                "I don't agree".into(),
                "concern".into(),
                "blocker".into(),
            ],
        }
    }
}

impl ConsensusConfig {
    pub fn default_phrases() -> Vec<String> {
        [
            "I agree with",
            "We've reached agreement",
            "The plan is",
            "Next steps are",
            "I'll take responsibility for",
            "Timeline agreed",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MentionConfig {
    /// File extensions (without the dot) recognised inside backticks.
    pub file_patterns: Vec<String>,
}

impl Default for MentionConfig {
    fn default() -> Self {
        Self {
            file_patterns: [
                "py", "rs", "ts", "tsx", "js", "go", "md", "toml", "json", "yaml", "yml", "sh",
                "c", "h", "cpp", "java",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvestigationConfig {
    pub enabled: bool,
    pub max_file_bytes: usize,
    pub max_matches: usize,
}

impl Default for InvestigationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_file_bytes: 16 * 1024,
            max_matches: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadConfig {
    /// Label attached to created threads and used to narrow searches.
    pub label: Option<String>,
    pub title_prefix: String,
    /// Keyword similarity at or above which an open thread counts as the same topic.
    pub match_threshold: f64,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            label: None,
            title_prefix: "[discuss]".into(),
            match_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Shell command producing reply bodies; request JSON is written to its stdin.
    pub command: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub dir: PathBuf,
    pub json: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DISCUSS_DIR).join("reports"),
            json: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub desktop: bool,
    pub event_log: bool,
    pub hook_command: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            desktop: true,
            event_log: true,
            hook_command: None,
        }
    }
}

/// Resolved on-disk locations for one repository.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub discuss_dir: PathBuf,
    pub sessions_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: PathBuf, config: &DiscussConfig) -> Self {
        let discuss_dir = root.join(DISCUSS_DIR);
        let reports_dir = if config.report.dir.is_absolute() {
            config.report.dir.clone()
        } else {
            root.join(&config.report.dir)
        };
        Self {
            sessions_dir: discuss_dir.join("sessions"),
            logs_dir: discuss_dir.join("logs"),
            reports_dir,
            discuss_dir,
            root,
        }
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.discuss_dir).await?;
        fs::create_dir_all(&self.sessions_dir).await?;
        fs::create_dir_all(&self.reports_dir).await?;
        fs::create_dir_all(&self.logs_dir).await?;
        Ok(())
    }
}
