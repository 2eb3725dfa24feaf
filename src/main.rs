//! Gatewatch - operator control surface for gated code-change workflows
//!
//! CLI entry point with global panic handler.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use gatewatch::chronicle::FileChronicle;
use gatewatch::config::{gatewatch_home, Config};
use gatewatch::error::{exit_codes, GatewatchError};
use gatewatch::workflow::{Orchestrator, Poller, SessionContext};

// =============================================================================
// CLI Definition
// =============================================================================

/// Gatewatch - operator control surface for gated code-change workflows
#[derive(Parser)]
#[command(name = "gatewatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the four gates of a receipt, replayed from its events
    Gates {
        /// Receipt to replay
        receipt_id: String,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Show ranked eligible tickets, blockers, lanes and approvals
    Readiness {
        /// Project to inspect
        project_id: String,
        /// Show collapsed passing safety checks
        #[arg(long, short)]
        expand: bool,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Summarize a JSON file of safety checks
    Safety {
        /// File holding a list of checks, or {explanations, computedAt}
        file: PathBuf,
        /// Show collapsed passing checks
        #[arg(long, short)]
        expand: bool,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Show the effective quarantine policy and capability table
    Policy {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Submit one governed action
    Act {
        #[command(subcommand)]
        action: ActAction,
        /// Project the action belongs to
        #[arg(long)]
        project: String,
        /// Receipt to act on
        #[arg(long)]
        receipt: Option<String>,
        /// Ticket to act on
        #[arg(long)]
        ticket: Option<String>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// Poll the ledger and print the derived view each tick
    Watch {
        /// Project to watch
        project_id: String,
        /// Receipt whose gates to show
        #[arg(long)]
        receipt: Option<String>,
        /// Ticket in focus
        #[arg(long)]
        ticket: Option<String>,
        /// Seconds between refreshes (overrides config)
        #[arg(long)]
        interval: Option<u64>,
        /// Stop after this many refreshes (overrides config; 0 = unbounded)
        #[arg(long)]
        max_polls: Option<u64>,
        /// Show collapsed passing safety checks
        #[arg(long, short)]
        expand: bool,
        /// Emit one JSON object per tick
        #[arg(long, short)]
        json: bool,
        /// Suppress per-tick output
        #[arg(long, short)]
        quiet: bool,
    },
}

#[derive(Subcommand, Clone)]
enum ActAction {
    /// Submit an intent (G1), creating a receipt
    Intent {
        /// What the change should do
        text: String,
    },
    /// Authorize execution of the receipt (G2)
    Authorize,
    /// Start executing the selected ticket (G3)
    Execute,
    /// Approve the produced changes (G4)
    Approve,
    /// Reject the produced changes (G4)
    Reject,
}

impl From<ActAction> for gatewatch::cli::ActRequest {
    fn from(action: ActAction) -> Self {
        use gatewatch::cli::ActRequest;
        match action {
            ActAction::Intent { text } => ActRequest::Intent { text },
            ActAction::Authorize => ActRequest::Authorize,
            ActAction::Execute => ActRequest::Execute,
            ActAction::Approve => ActRequest::Approve,
            ActAction::Reject => ActRequest::Reject,
        }
    }
}

// =============================================================================
// Entry Point
// =============================================================================

fn main() -> ExitCode {
    setup_panic_handler();
    init_tracing();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("gatewatch error: {}", e);
            exit_code(exit_codes::ERROR)
        }
    }
}

/// Log to stderr, filtered by `GATEWATCH_LOG` (default `warn`).
fn init_tracing() {
    let filter = std::env::var("GATEWATCH_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Set up the global panic handler.
///
/// On panic, logs to ~/.gatewatch/crash.log and exits with the error code.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("gatewatch panic: {}", info);

        if let Some(home) = gatewatch_home() {
            let crash_log = home.join("crash.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::ERROR);
    }));
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(code as u8)
}

fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        exit_code(exit_codes::OK)
    } else {
        exit_code(exit_codes::ERROR)
    }
}

fn print_formatted(formatted: &str) {
    if !formatted.is_empty() {
        println!("{}", formatted.trim_end_matches('\n'));
    }
}

/// Run the CLI and return the exit code.
fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e @ GatewatchError::PolicyViolation { .. }) => {
            eprintln!("gatewatch: refusing to start: {}", e);
            return Ok(exit_code(exit_codes::POLICY_VIOLATION));
        }
        Err(e) => {
            eprintln!("gatewatch: {}", e);
            return Ok(exit_code(exit_codes::ERROR));
        }
    };

    match cli.command {
        Commands::Gates {
            receipt_id,
            json,
            quiet,
        } => run_gates(&config, &receipt_id, json, quiet),
        Commands::Readiness {
            project_id,
            expand,
            json,
            quiet,
        } => run_readiness(&config, &project_id, expand, json, quiet),
        Commands::Safety {
            file,
            expand,
            json,
            quiet,
        } => run_safety(&file, expand, json, quiet),
        Commands::Policy { json, quiet } => run_policy(config, json, quiet),
        Commands::Act {
            action,
            project,
            receipt,
            ticket,
            json,
            quiet,
        } => {
            let session = session_for(project, receipt, ticket);
            run_act(&config, session, action, json, quiet)
        }
        Commands::Watch {
            project_id,
            receipt,
            ticket,
            interval,
            max_polls,
            expand,
            json,
            quiet,
        } => {
            let session = session_for(project_id, receipt, ticket);
            let mut polling = config.polling.clone();
            if let Some(interval) = interval {
                polling.interval_seconds = interval;
            }
            if let Some(max_polls) = max_polls {
                polling.max_polls = max_polls;
            }
            run_watch(&config, session, Poller::from_config(&polling), expand, json, quiet)
        }
    }
}

fn session_for(
    project_id: String,
    receipt: Option<String>,
    ticket: Option<String>,
) -> SessionContext {
    let mut session = SessionContext::new(project_id);
    if let Some(receipt_id) = receipt {
        session = session.with_receipt(receipt_id);
    }
    if let Some(ticket_id) = ticket {
        session = session.with_ticket(ticket_id);
    }
    session
}

fn open_chronicle(config: &Config) -> Result<Arc<FileChronicle>, Box<dyn std::error::Error>> {
    let dir = config
        .ledger_dir()
        .ok_or_else(|| GatewatchError::config("could not determine ledger directory"))?;
    tracing::debug!(ledger_dir = %dir.display(), "opening ledger");
    Ok(Arc::new(FileChronicle::open(dir)?))
}

fn orchestrator(
    config: &Config,
    session: SessionContext,
) -> Result<Orchestrator<Arc<FileChronicle>, Arc<FileChronicle>>, Box<dyn std::error::Error>> {
    let chronicle = open_chronicle(config)?;
    Ok(Orchestrator::new(
        Arc::clone(&chronicle),
        chronicle,
        config.quarantine.clone(),
        config.operator.agent_id.clone(),
        session,
    )?)
}

// =============================================================================
// Command Implementations
// =============================================================================

fn run_gates(
    config: &Config,
    receipt_id: &str,
    json: bool,
    quiet: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use gatewatch::cli::gates_cmd::{GatesCommand, GatesOptions};

    let cmd = GatesCommand::new(open_chronicle(config)?);
    let options = GatesOptions { json, quiet };

    let output = cmd.run(receipt_id);
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_readiness(
    config: &Config,
    project_id: &str,
    expand: bool,
    json: bool,
    quiet: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use gatewatch::cli::readiness_cmd::{ReadinessCommand, ReadinessOptions};

    let cmd = ReadinessCommand::new(open_chronicle(config)?);
    let options = ReadinessOptions {
        json,
        quiet,
        expand,
    };

    let output = cmd.run(project_id);
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_safety(
    file: &Path,
    expand: bool,
    json: bool,
    quiet: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use gatewatch::cli::safety_cmd::{SafetyCommand, SafetyOptions};

    let cmd = SafetyCommand::new();
    let options = SafetyOptions {
        json,
        quiet,
        expand,
    };

    let output = cmd.run(file, chrono::Utc::now());
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_policy(
    config: Config,
    json: bool,
    quiet: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use gatewatch::cli::policy_cmd::{PolicyCommand, PolicyOptions};

    let cmd = PolicyCommand::new(config);
    let options = PolicyOptions { json, quiet };

    let output = cmd.run();
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_act(
    config: &Config,
    session: SessionContext,
    action: ActAction,
    json: bool,
    quiet: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use gatewatch::cli::act::{ActCommand, ActOptions};

    let mut cmd = ActCommand::new(orchestrator(config, session)?);
    let options = ActOptions { json, quiet };

    let output = cmd.run(&action.into());
    print_formatted(&cmd.format_output(&output, &options));

    Ok(exit_code(output.exit_code()))
}

fn run_watch(
    config: &Config,
    session: SessionContext,
    poller: Poller,
    expand: bool,
    json: bool,
    quiet: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use gatewatch::cli::watch::{WatchCommand, WatchOptions};

    if !gatewatch::config::PollingConfig::is_valid_interval(poller.interval().as_secs()) {
        eprintln!(
            "gatewatch: --interval must be at least {} second(s)",
            gatewatch::config::MIN_POLL_INTERVAL_SECONDS
        );
        return Ok(exit_code(exit_codes::ERROR));
    }

    let mut cmd = WatchCommand::new(orchestrator(config, session)?, poller);
    let options = WatchOptions {
        json,
        quiet,
        expand,
    };

    let output = cmd.run(&options, print_formatted);
    if let Some(error) = &output.error {
        eprintln!(
            "gatewatch: {} of {} refreshes failed; last error: {}",
            output.failures, output.ticks, error
        );
    }

    Ok(success_to_exit_code(output.success))
}
