use console::{Style, style};
use indicatif::{ProgressBar, ProgressStyle};

use crate::discussion::{ConsensusState, SessionCheckpoint, SessionOutcome, TerminationReason};
use crate::thread::ResolveOutcome;
use crate::utils::truncate_at_boundary;

pub struct Display;

impl Display {
    pub fn new() -> Self {
        Self
    }

    pub fn print_header(&self, text: &str) {
        println!();
        println!("{}", style(text).bold().cyan());
        println!("{}", style("═".repeat(60)).dim());
        println!();
    }

    pub fn print_resolution(&self, outcome: &SessionOutcome) {
        let how = match &outcome.resolution {
            ResolveOutcome::Explicit => "joined".to_string(),
            ResolveOutcome::Matched { similarity_pct } => {
                format!("matched existing ({}%)", similarity_pct)
            }
            ResolveOutcome::Created => "created".to_string(),
            ResolveOutcome::Reconciled { closed } => {
                format!("joined older thread, closed duplicate #{}", closed)
            }
        };
        println!(
            "Thread:      {} {} ({})",
            style(format!("#{}", outcome.thread.id)).bold(),
            outcome.thread.title,
            style(how).dim()
        );
        if let Some(url) = &outcome.thread.url {
            println!("URL:         {}", style(url).underlined());
        }
    }

    pub fn print_outcome(&self, outcome: &SessionOutcome) {
        self.print_header(&format!("Discussion: {}", outcome.report.topic));
        self.print_resolution(outcome);

        println!(
            "Consensus:   {}",
            self.consensus_style(outcome.consensus)
                .apply_to(outcome.consensus.to_string())
        );
        println!(
            "Ended:       {}",
            self.termination_style(&outcome.termination)
                .apply_to(outcome.termination.describe())
        );
        println!(
            "Activity:    {} comments seen, {} posted{}",
            outcome.comments_seen,
            outcome.messages_posted,
            if outcome.resumed { " (resumed)" } else { "" }
        );
        println!();

        let report = &outcome.report;
        if report.participants.is_empty() {
            println!("{}", style("No other participant commented.").dim());
        } else {
            println!("{}", style("Participants:").bold());
            for section in &report.participants {
                let kind = if section.is_agent { "agent" } else { "human" };
                println!(
                    "  {} {} ({}, {} comments)",
                    style("→").cyan(),
                    section.author,
                    kind,
                    section.contributions.len()
                );
            }
        }

        if !report.next_steps.is_empty() {
            println!();
            println!("{}", style("Next steps:").bold());
            for s in &report.next_steps {
                println!("  {}: {}", style(&s.author).bold(), s.text);
            }
        }

        if !report.disagreements.is_empty() {
            println!();
            println!("{}", style("Unresolved:").yellow().bold());
            for s in &report.disagreements {
                println!("  {}: {}", style(&s.author).bold(), s.text);
            }
        }
        println!();
    }

    pub fn print_sessions_table(&self, sessions: &[SessionCheckpoint]) {
        if sessions.is_empty() {
            println!("{}", style("No discussion sessions found.").dim());
            return;
        }

        println!(
            "{:<8} {:<36} {:<22} {:<20}",
            style("Issue").bold(),
            style("Topic").bold(),
            style("Consensus").bold(),
            style("Updated").bold()
        );
        println!("{}", style("─".repeat(86)).dim());

        for s in sessions {
            println!(
                "{:<8} {:<36} {:<22} {:<20}",
                format!("#{}", s.thread_id),
                truncate_at_boundary(&s.topic, 34),
                self.consensus_style(s.consensus_state)
                    .apply_to(s.consensus_state.to_string()),
                s.updated_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    pub fn print_session_detail(&self, session: &SessionCheckpoint) {
        self.print_header(&format!("Discussion #{}", session.thread_id));
        println!("Topic:       {}", style(&session.topic).white().bold());
        println!(
            "Consensus:   {}",
            self.consensus_style(session.consensus_state)
                .apply_to(session.consensus_state.to_string())
        );
        match (&session.cursor.last_seen_timestamp, &session.cursor.last_seen_id) {
            (Some(ts), Some(id)) => println!(
                "Last seen:   comment {} at {}",
                id,
                ts.format("%Y-%m-%d %H:%M:%S")
            ),
            _ => println!("Last seen:   {}", style("nothing yet").dim()),
        }
        println!(
            "{}",
            style(format!(
                "Updated: {}",
                session.updated_at.format("%Y-%m-%d %H:%M:%S")
            ))
            .dim()
        );
    }

    pub fn print_success(&self, message: &str) {
        println!("{} {}", style("✓").green().bold(), message);
    }

    pub fn print_error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red().bold(), message);
    }

    pub fn print_warning(&self, message: &str) {
        println!("{} {}", style("!").yellow().bold(), message);
    }

    pub fn print_info(&self, message: &str) {
        println!("{} {}", style("→").cyan(), message);
    }

    pub fn create_spinner(&self, message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .expect("static template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        pb
    }

    fn consensus_style(&self, state: ConsensusState) -> Style {
        match state {
            ConsensusState::Discussing => Style::new().dim(),
            ConsensusState::ConsensusSuggested => Style::new().yellow(),
            ConsensusState::ConsensusConfirmed => Style::new().green().bold(),
        }
    }

    fn termination_style(&self, reason: &TerminationReason) -> Style {
        match reason {
            TerminationReason::ConsensusConfirmed => Style::new().green(),
            TerminationReason::TimedOut => Style::new().yellow(),
            TerminationReason::Cancelled => Style::new().dim(),
            TerminationReason::Failed(_) => Style::new().red().bold(),
        }
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}
