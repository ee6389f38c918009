use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use discuss_pilot::cli::{Cli, Commands, ConfigAction, Display, OutputFormat};
use discuss_pilot::config::{DISCUSS_DIR, DiscussConfig, ProjectPaths};
use discuss_pilot::discussion::{
    CommandResponder, ContextInvestigator, CursorStore, DiscussionSession, FileReportSink,
    Responder, SessionRequest, SilentResponder,
};
use discuss_pilot::error::{DiscussError, Result};
use discuss_pilot::git::GhRunner;
use discuss_pilot::identity::{AgentIdentity, LocalIdentity};
use discuss_pilot::notification::Notifier;
use discuss_pilot::output::OutputWriter;
use discuss_pilot::signal::SignalHandler;
use discuss_pilot::thread::GhThreadService;

/// Context for command output handling.
struct OutputContext<'a> {
    display: &'a Display,
    writer: &'a OutputWriter,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            Display::new().print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("discuss_pilot=debug")
    } else {
        EnvFilter::new("discuss_pilot=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

/// `Ok(false)` means the command ran but the session halted on an error.
async fn run(cli: Cli) -> Result<bool> {
    let display = Display::new();
    let writer = OutputWriter::new(cli.output);
    let out = OutputContext {
        display: &display,
        writer: &writer,
    };

    match cli.command {
        Commands::Init => cmd_init(&out).await.map(|_| true),
        Commands::Start {
            topic,
            issue,
            message,
            interval,
            timeout,
            responder,
        } => {
            let overrides = StartOverrides {
                interval,
                timeout,
                responder,
            };
            cmd_start(&out, topic, issue, message, overrides).await
        }
        Commands::Status { issue } => cmd_status(&out, issue).await.map(|_| true),
        Commands::Config { action } => cmd_config(&out, action).await.map(|_| true),
    }
}

fn find_project_root() -> Result<PathBuf> {
    let current = std::env::current_dir()?;

    let mut path = current.as_path();
    loop {
        if path.join(".git").exists() {
            return Ok(path.to_path_buf());
        }
        path = path.parent().ok_or(DiscussError::NotInGitRepo)?;
    }
}

async fn cmd_init(out: &OutputContext<'_>) -> Result<()> {
    let root = find_project_root()?;
    let config = DiscussConfig::default();
    let paths = ProjectPaths::new(root, &config);

    if paths.discuss_dir.join("config.toml").exists() {
        if out.writer.format() == OutputFormat::Text {
            out.display
                .print_warning("discuss-pilot is already initialized in this repository.");
        }
        return Ok(());
    }

    paths.ensure_dirs().await?;
    config.save(&paths.discuss_dir).await?;

    if out.writer.format() == OutputFormat::Text {
        out.display.print_success("Initialized discuss-pilot.");
        out.display.print_info(&format!(
            "Configuration: {}",
            paths.discuss_dir.join("config.toml").display()
        ));
        out.display
            .print_info(&format!("Reports: {}", paths.reports_dir.display()));
    } else {
        out.writer.emit_message("Initialized discuss-pilot");
    }

    Ok(())
}

struct StartOverrides {
    interval: Option<u64>,
    timeout: Option<u64>,
    responder: Option<String>,
}

async fn cmd_start(
    out: &OutputContext<'_>,
    topic: String,
    issue: Option<u64>,
    message: Option<String>,
    overrides: StartOverrides,
) -> Result<bool> {
    let root = find_project_root()?;
    let mut config = DiscussConfig::load(&root.join(DISCUSS_DIR)).await?;
    if let Some(secs) = overrides.interval {
        config.polling.interval_secs = secs;
    }
    if let Some(secs) = overrides.timeout {
        config.session.max_monitoring_secs = secs;
    }
    if overrides.responder.is_some() {
        config.responder.command = overrides.responder;
    }
    config.validate()?;

    let paths = ProjectPaths::new(root.clone(), &config);
    paths.ensure_dirs().await?;

    let identity = AgentIdentity::resolve(&LocalIdentity::new(&root)).await?;
    info!(identity = %identity, "Starting discussion");

    let gh = GhRunner::new(&root, config.polling.per_call_timeout()).with_repo(identity.repo_slug());
    let service = Arc::new(GhThreadService::new(gh).with_label(config.thread.label.clone()));

    let responder: Arc<dyn Responder> = match &config.responder.command {
        Some(command) => {
            let mut r = CommandResponder::new(command);
            if let Some(secs) = config.responder.timeout_secs {
                r = r.with_timeout(Duration::from_secs(secs));
            }
            Arc::new(r)
        }
        None => Arc::new(SilentResponder),
    };

    let signal = SignalHandler::new();
    let ctrl_c = signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing with a report");
            ctrl_c.cancel();
        }
    });

    let notifier = Notifier::new(config.notification.clone(), Some(paths.logs_dir.clone()));
    let investigator = ContextInvestigator::for_repo(&root, config.investigation.clone());
    let file_sink = Arc::new(FileReportSink::new(&paths.reports_dir, config.report.json));

    let mut session = DiscussionSession::new(identity, config, service, signal)
        .with_investigator(investigator)
        .with_responder(responder)
        .with_store(CursorStore::new(&paths.sessions_dir))
        .with_sink(file_sink.clone())
        .with_sink(Arc::new(notifier.clone()))
        .with_notifier(notifier);

    let spinner = if out.writer.format() == OutputFormat::Text {
        Some(out.display.create_spinner(&format!("Discussing: {}", topic)))
    } else {
        None
    };

    let request = SessionRequest::new(topic)
        .with_thread(issue)
        .with_opening_message(message);
    let result = session.run(request).await;

    if let Some(s) = spinner {
        s.finish_and_clear();
    }

    let outcome = result?;
    match out.writer.format() {
        OutputFormat::Text => {
            out.display.print_outcome(&outcome);
            out.display.print_info(&format!(
                "Report: {}",
                file_sink.markdown_path(&outcome.report).display()
            ));
            if outcome.is_success() {
                out.display.print_success("Discussion finished.");
            } else {
                out.display
                    .print_error(&format!("Discussion {}", outcome.termination.describe()));
            }
        }
        OutputFormat::Json => out.writer.emit_outcome(&outcome),
    }

    Ok(outcome.is_success())
}

async fn cmd_status(out: &OutputContext<'_>, issue: Option<u64>) -> Result<()> {
    let root = find_project_root()?;
    let config = DiscussConfig::load(&root.join(DISCUSS_DIR)).await?;
    let paths = ProjectPaths::new(root, &config);
    let store = CursorStore::new(&paths.sessions_dir);

    match issue {
        Some(id) => {
            let Some(session) = store.load(id).await? else {
                if out.writer.format() == OutputFormat::Text {
                    out.display
                        .print_warning(&format!("No session recorded for issue #{}", id));
                }
                return Ok(());
            };
            match out.writer.format() {
                OutputFormat::Text => out.display.print_session_detail(&session),
                OutputFormat::Json => out.writer.emit_sessions(std::slice::from_ref(&session)),
            }
        }
        None => {
            let sessions = store.list().await?;
            match out.writer.format() {
                OutputFormat::Text => {
                    out.display.print_header("Discussion Sessions");
                    out.display.print_sessions_table(&sessions);
                }
                OutputFormat::Json => out.writer.emit_sessions(&sessions),
            }
        }
    }

    Ok(())
}

async fn cmd_config(out: &OutputContext<'_>, action: ConfigAction) -> Result<()> {
    let root = find_project_root()?;
    let discuss_dir = root.join(DISCUSS_DIR);

    match action {
        ConfigAction::Show => {
            let config = DiscussConfig::load(&discuss_dir).await?;
            match out.writer.format() {
                OutputFormat::Text => {
                    let text = toml::to_string_pretty(&config)
                        .map_err(|e| DiscussError::Config(e.to_string()))?;
                    println!("{}", text);
                }
                OutputFormat::Json => {
                    let json = serde_json::to_string_pretty(&config)?;
                    println!("{}", json);
                }
            }
        }
        ConfigAction::Path => {
            out.writer
                .emit_message(&discuss_dir.join("config.toml").display().to_string());
        }
    }

    Ok(())
}
