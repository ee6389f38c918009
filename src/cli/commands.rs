use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "discuss-pilot")]
#[command(author, version, about = "Multi-agent discussion coordinator over GitHub issues", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Output format for CLI results.
/// - Text: Human-readable text output (default)
/// - Json: Single JSON object at completion
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize discuss-pilot in the current repository
    Init,

    /// Open or join a discussion and monitor it until consensus or timeout
    Start {
        /// Discussion topic
        topic: String,

        /// Join this issue number instead of searching for the topic
        #[arg(long)]
        issue: Option<u64>,

        /// Opening message (otherwise asked from the responder)
        #[arg(long, short = 'm')]
        message: Option<String>,

        /// Seconds between polls
        #[arg(long)]
        interval: Option<u64>,

        /// Maximum monitoring time in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Shell command producing replies (request JSON on stdin)
        #[arg(long, env = "DISCUSS_RESPONDER")]
        responder: Option<String>,
    },

    /// Show checkpointed discussion sessions
    Status {
        /// Issue number (optional, shows all if not specified)
        #[arg(long)]
        issue: Option<u64>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show effective configuration
    Show,
    /// Print the configuration file path
    Path,
}
