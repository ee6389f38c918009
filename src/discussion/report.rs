//! End-of-session report: who said what, where it landed, who owns what next.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use super::consensus::{ConsensusSignal, ConsensusState};
use super::parser::ParsedComment;
use crate::config::ConsensusConfig;
use crate::error::{DiscussError, Result};
use crate::identity::AgentIdentity;
use crate::thread::ThreadHandle;
use crate::utils::{sentences_matching, truncate_at_boundary};

const SUMMARY_MAX_LEN: usize = 600;
const OWNERSHIP_PHRASES: [&str; 2] = ["I'll take responsibility for", "Next steps are"];
const PLAN_PHRASES: [&str; 4] = [
    "The plan is",
    "We've reached agreement",
    "I agree with",
    "Timeline agreed",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum TerminationReason {
    ConsensusConfirmed,
    TimedOut,
    Cancelled,
    Failed(String),
}

impl TerminationReason {
    pub fn describe(&self) -> String {
        match self {
            Self::ConsensusConfirmed => "consensus confirmed".into(),
            Self::TimedOut => "monitoring time limit reached".into(),
            Self::Cancelled => "cancelled by operator".into(),
            Self::Failed(e) => format!("halted on error: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub comment_id: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSection {
    pub author: String,
    pub is_agent: bool,
    pub contributions: Vec<Contribution>,
}

/// A sentence attributed to the participant who wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub author: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub topic: String,
    pub thread: ThreadHandle,
    pub agent: AgentIdentity,
    pub generated_at: DateTime<Utc>,
    pub problem_summary: String,
    pub participants: Vec<AuthorSection>,
    pub consensus: ConsensusState,
    pub signals: Vec<ConsensusSignal>,
    pub interpretation: String,
    pub next_steps: Vec<Statement>,
    pub disagreements: Vec<Statement>,
    pub termination: TerminationReason,
}

impl Report {
    /// Number of non-self contributions across all participants.
    pub fn contribution_count(&self) -> usize {
        self.participants.iter().map(|s| s.contributions.len()).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# Discussion report: {}\n", self.topic);
        let _ = writeln!(
            md,
            "- Thread: #{}{}",
            self.thread.id,
            self.thread
                .url
                .as_deref()
                .map(|u| format!(" ({})", u))
                .unwrap_or_default()
        );
        let _ = writeln!(md, "- Agent: {}", self.agent);
        let _ = writeln!(md, "- Consensus: {}", self.consensus);
        let _ = writeln!(md, "- Ended: {}", self.termination.describe());
        let _ = writeln!(
            md,
            "- Generated: {}\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        let _ = writeln!(md, "## Problem\n\n{}\n", self.problem_summary);

        let _ = writeln!(md, "## Contributions\n");
        if self.participants.is_empty() {
            let _ = writeln!(md, "_No other participant commented._\n");
        }
        for section in &self.participants {
            let kind = if section.is_agent { "agent" } else { "human" };
            let _ = writeln!(md, "### {} ({})\n", section.author, kind);
            for c in &section.contributions {
                let _ = writeln!(
                    md,
                    "- {} ({}): {}",
                    c.created_at.format("%H:%M"),
                    c.comment_id,
                    c.text.replace('\n', " ")
                );
            }
            md.push('\n');
        }

        let _ = writeln!(md, "## Interpretation\n\n{}\n", self.interpretation);

        let _ = writeln!(md, "## Next steps\n");
        write_statements(&mut md, &self.next_steps, "_No ownership was claimed._");

        let _ = writeln!(md, "## Unresolved disagreements\n");
        write_statements(&mut md, &self.disagreements, "_None raised._");

        md
    }
}

fn write_statements(md: &mut String, statements: &[Statement], empty: &str) {
    if statements.is_empty() {
        let _ = writeln!(md, "{}\n", empty);
        return;
    }
    for s in statements {
        let _ = writeln!(md, "- **{}**: {}", s.author, s.text);
    }
    md.push('\n');
}

pub struct ReportGenerator {
    disagreement_phrases: Vec<String>,
}

impl ReportGenerator {
    pub fn new(config: &ConsensusConfig) -> Self {
        Self {
            disagreement_phrases: config.disagreement_phrases.clone(),
        }
    }

    pub fn generate(
        &self,
        all: &[ParsedComment],
        consensus: ConsensusState,
        signals: &[ConsensusSignal],
        identity: &AgentIdentity,
        thread: &ThreadHandle,
        topic: &str,
        termination: TerminationReason,
    ) -> Report {
        Report {
            topic: topic.to_string(),
            thread: thread.clone(),
            agent: identity.clone(),
            generated_at: Utc::now(),
            problem_summary: problem_summary(topic, all),
            participants: group_by_author(all),
            consensus,
            signals: signals.to_vec(),
            interpretation: interpret(all, consensus, signals),
            next_steps: statements(all, &phrases(&OWNERSHIP_PHRASES)),
            disagreements: statements(all, &self.disagreement_phrases),
            termination,
        }
    }
}

fn phrases(list: &[&str]) -> Vec<String> {
    list.iter().map(|p| p.to_string()).collect()
}

fn problem_summary(topic: &str, all: &[ParsedComment]) -> String {
    match all.first() {
        Some(first) => format!(
            "{}\n\n> {}",
            topic,
            truncate_at_boundary(first.text(), SUMMARY_MAX_LEN).replace('\n', "\n> ")
        ),
        None => topic.to_string(),
    }
}

/// One section per non-self speaker, ordered by first appearance.
fn group_by_author(all: &[ParsedComment]) -> Vec<AuthorSection> {
    let mut order: Vec<String> = Vec::new();
    let mut sections: BTreeMap<String, AuthorSection> = BTreeMap::new();

    for parsed in all.iter().filter(|p| !p.is_self) {
        let author = parsed.speaker().to_string();
        let section = sections.entry(author.clone()).or_insert_with(|| {
            order.push(author.clone());
            AuthorSection {
                author,
                is_agent: parsed.is_agent(),
                contributions: Vec::new(),
            }
        });
        section.contributions.push(Contribution {
            comment_id: parsed.comment.id.clone(),
            created_at: parsed.comment.created_at,
            text: parsed.text().to_string(),
        });
    }

    order
        .into_iter()
        .filter_map(|a| sections.remove(&a))
        .collect()
}

fn statements(all: &[ParsedComment], phrases: &[String]) -> Vec<Statement> {
    all.iter()
        .flat_map(|p| {
            sentences_matching(p.text(), phrases)
                .into_iter()
                .map(|text| Statement {
                    author: p.speaker().to_string(),
                    text,
                })
        })
        .collect()
}

fn interpret(all: &[ParsedComment], consensus: ConsensusState, signals: &[ConsensusSignal]) -> String {
    let mut authors: Vec<&str> = Vec::new();
    for signal in signals.iter().filter(|s| !s.is_self) {
        if !authors.contains(&signal.author.as_str()) {
            authors.push(&signal.author);
        }
    }

    let plan: Vec<String> = statements(all, &phrases(&PLAN_PHRASES))
        .into_iter()
        .map(|s| format!("{} ({})", s.text, s.author))
        .collect();

    let mut text = match consensus {
        // Restored from a checkpoint: signals are not persisted across runs.
        ConsensusState::ConsensusConfirmed | ConsensusState::ConsensusSuggested
            if authors.is_empty() =>
        {
            format!("The {} state was carried over from an earlier run of this session.", consensus)
        }
        ConsensusState::ConsensusConfirmed => format!(
            "Consensus confirmed by {} participants: {}.",
            authors.len(),
            authors.join(", ")
        ),
        ConsensusState::ConsensusSuggested => format!(
            "Consensus was suggested by {} but not confirmed by a second participant.",
            authors.join(", ")
        ),
        ConsensusState::Discussing => "No consensus was reached.".to_string(),
    };

    if !plan.is_empty() {
        text.push_str(" My reading of the agreed direction:");
        for line in plan {
            text.push_str("\n- ");
            text.push_str(&line);
        }
    }
    text
}

/// Destination for the final report.
#[async_trait]
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &str;
    async fn deliver(&self, report: &Report) -> Result<()>;
}

/// Writes `<dir>/<thread>-<timestamp>.md` and, optionally, the matching `.json`.
pub struct FileReportSink {
    dir: PathBuf,
    json: bool,
}

impl FileReportSink {
    pub fn new(dir: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            dir: dir.into(),
            json,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stem(report: &Report) -> String {
        format!(
            "{}-{}",
            report.thread.id,
            report.generated_at.format("%Y%m%dT%H%M%SZ")
        )
    }

    pub fn markdown_path(&self, report: &Report) -> PathBuf {
        self.dir.join(format!("{}.md", Self::stem(report)))
    }

    pub fn json_path(&self, report: &Report) -> PathBuf {
        self.dir.join(format!("{}.json", Self::stem(report)))
    }
}

#[async_trait]
impl ReportSink for FileReportSink {
    fn name(&self) -> &str {
        "file"
    }

    async fn deliver(&self, report: &Report) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DiscussError::Report(format!("{}: {}", self.dir.display(), e)))?;

        let md_path = self.markdown_path(report);
        fs::write(&md_path, report.to_markdown()).await?;

        if self.json {
            fs::write(self.json_path(report), report.to_json()?).await?;
        }

        info!(path = %md_path.display(), "Report written");
        Ok(())
    }
}
