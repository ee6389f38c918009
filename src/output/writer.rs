use std::io::{self, Write};

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::discussion::{ConsensusState, SessionCheckpoint, SessionOutcome, TerminationReason};
use crate::thread::ThreadId;

/// Machine-readable counterpart of the text display.
///
/// Text mode prints plain lines; JSON mode writes one JSON document per call to stdout.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Returns the configured output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn emit_outcome(&self, outcome: &SessionOutcome) {
        match self.format {
            OutputFormat::Text => self.print_text_outcome(outcome),
            OutputFormat::Json => self.write_json(&SessionOutput::from(outcome)),
        }
    }

    pub fn emit_sessions(&self, sessions: &[SessionCheckpoint]) {
        match self.format {
            OutputFormat::Text => {
                for s in sessions {
                    println!("#{} {} [{}]", s.thread_id, s.topic, s.consensus_state);
                }
            }
            OutputFormat::Json => self.write_json(&sessions),
        }
    }

    /// Emit a simple message.
    pub fn emit_message(&self, message: &str) {
        match self.format {
            OutputFormat::Text => {
                println!("{}", message);
            }
            OutputFormat::Json => {
                let msg = MessageOutput {
                    message: message.to_string(),
                };
                self.write_json(&msg);
            }
        }
    }

    fn write_json<T: Serialize>(&self, value: &T) {
        if let Ok(json) = serde_json::to_string(value) {
            let mut stdout = io::stdout().lock();
            let _ = writeln!(stdout, "{}", json);
            let _ = stdout.flush();
        }
    }

    fn print_text_outcome(&self, outcome: &SessionOutcome) {
        println!();
        println!(
            "Discussion #{} ended: {}",
            outcome.thread.id,
            outcome.termination.describe()
        );
        println!("Consensus: {}", outcome.consensus);
        println!(
            "Contributions from others: {}",
            outcome.report.contribution_count()
        );
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionOutput {
    pub success: bool,
    pub thread_id: ThreadId,
    pub thread_url: Option<String>,
    pub topic: String,
    pub consensus: ConsensusState,
    pub termination: TerminationReason,
    pub comments_seen: usize,
    pub messages_posted: usize,
    pub report_markdown: String,
}

impl From<&SessionOutcome> for SessionOutput {
    fn from(outcome: &SessionOutcome) -> Self {
        Self {
            success: outcome.is_success(),
            thread_id: outcome.thread.id,
            thread_url: outcome.thread.url.clone(),
            topic: outcome.report.topic.clone(),
            consensus: outcome.consensus,
            termination: outcome.termination.clone(),
            comments_seen: outcome.comments_seen,
            messages_posted: outcome.messages_posted,
            report_markdown: outcome.report.to_markdown(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct MessageOutput {
    message: String,
}
