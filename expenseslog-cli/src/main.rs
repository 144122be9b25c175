//! ExpensesLog CLI - track statement expenses and reimbursements from the terminal

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use expenseslog_core::services::{EntryPoint, LogEvent, LoggingService};
use expenseslog_core::services::events;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{auth, config, dashboard, expenses, history, logs, shell, upload};

/// ExpensesLog - statement expenses and reimbursements in your terminal
#[derive(Parser)]
#[command(name = "el", version, about, long_about = None)]
struct Cli {
    /// Show debug output on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LoginArgs {
    /// Account email
    #[arg(long, short)]
    email: Option<String>,
    /// Account password (prompted when omitted)
    #[arg(long, short)]
    password: Option<String>,
    /// Sign in with a Google ID token instead
    #[arg(long, conflicts_with_all = ["email", "password", "token"])]
    google_token: Option<String>,
    /// Adopt an existing access token
    #[arg(long, conflicts_with_all = ["email", "password"])]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in
    Login(LoginArgs),

    /// Create an account and sign in
    Signup {
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Account email
        #[arg(long, short)]
        email: Option<String>,
        /// Password (prompted twice when omitted)
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload a bank statement (PDF or CSV)
    Upload {
        /// Statement file
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List expenses
    Expenses {
        #[command(flatten)]
        filters: expenses::FilterArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Submit expenses for reimbursement
    Reimburse {
        /// Expense IDs (comma separated, or piped on stdin)
        #[arg(long, value_delimiter = ',')]
        ids: Vec<i64>,
        /// Note stored with the reimbursement
        #[arg(long, short)]
        note: Option<String>,
        /// Skip confirmation prompt
        #[arg(long, short)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show past reimbursements
    History {
        /// Show the expenses covered by one reimbursement
        #[arg(long)]
        id: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show spending totals and breakdowns
    Dashboard {
        /// Number of payees to rank
        #[arg(long, default_value = "5")]
        top: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive session
    Shell,

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },

    /// View and manage the local event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Login(_) => "login",
            Commands::Signup { .. } => "signup",
            Commands::Logout => "logout",
            Commands::Whoami { .. } => "whoami",
            Commands::Upload { .. } => "upload",
            Commands::Expenses { .. } => "expenses",
            Commands::Reimburse { .. } => "reimburse",
            Commands::History { .. } => "history",
            Commands::Dashboard { .. } => "dashboard",
            Commands::Shell => "shell",
            Commands::Config { .. } => "config",
            Commands::Logs { .. } => "logs",
        }
    }

    fn entry_point(&self) -> EntryPoint {
        match self {
            Commands::Shell => EntryPoint::Shell,
            _ => EntryPoint::Cli,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("EXPENSESLOG_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second init (tests, embedding) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let name = cli.command.name();
    let logger = match cli.command {
        // The log commands read the event log; opening it twice would lock it
        Commands::Logs { .. } => None,
        ref command => commands::get_logger(command.entry_point()),
    };

    let result = run(cli.command, logger.clone()).await;
    record_outcome(logger.as_deref(), name, &result);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&describe(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, logger: Option<Arc<LoggingService>>) -> Result<()> {
    tracing::debug!(command = command.name(), "running command");
    match command {
        Commands::Login(args) => {
            let method = match (args.google_token, args.token) {
                (Some(id_token), _) => auth::LoginMethod::Google(id_token),
                (None, Some(token)) => auth::LoginMethod::Token(token),
                (None, None) => auth::LoginMethod::Password {
                    email: args.email,
                    password: args.password,
                },
            };
            auth::login(method, logger).await
        }
        Commands::Signup { name, email, password } => auth::signup(name, email, password, logger).await,
        Commands::Logout => auth::logout(logger),
        Commands::Whoami { json } => auth::whoami(json, logger).await,
        Commands::Upload { file, json } => upload::run(file, json, logger).await,
        Commands::Expenses { filters, json } => expenses::list(filters, json, logger).await,
        Commands::Reimburse { ids, note, yes, json } => {
            expenses::reimburse(ids, note, yes, json, logger).await
        }
        Commands::History { id, json } => history::run(id, json, logger).await,
        Commands::Dashboard { top, json } => dashboard::run(top, json, logger).await,
        Commands::Shell => shell::run(logger).await,
        Commands::Config { command } => config::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}

/// Core errors carry their own user-facing wording
fn describe(error: &anyhow::Error) -> String {
    match error.downcast_ref::<expenseslog_core::Error>() {
        Some(core) => core.user_message(),
        None => format!("{:#}", error),
    }
}

/// Event recorded for a finished command; the full error chain goes in
/// the details when it says more than the user-facing message
fn outcome_event(command: &str, result: &Result<()>) -> LogEvent {
    match result {
        Ok(()) => LogEvent::new(events::COMMAND_EXECUTED).with_command(command),
        Err(e) => {
            let message = describe(e);
            let chain = format!("{:#}", e);
            let mut event = LogEvent::new(events::COMMAND_FAILED).with_command(command);
            if chain != message {
                event = event.with_error_details(chain);
            }
            if let Some(expenseslog_core::Error::Api { status, .. }) =
                e.downcast_ref::<expenseslog_core::Error>()
            {
                event = event.with_status(*status);
            }
            event.with_error(message)
        }
    }
}

fn record_outcome(logger: Option<&LoggingService>, command: &str, result: &Result<()>) {
    if let Some(logger) = logger {
        logger.record(outcome_event(command, result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_records_command() {
        let event = outcome_event("expenses", &Ok(()));
        assert_eq!(event.event, events::COMMAND_EXECUTED);
        assert_eq!(event.command.as_deref(), Some("expenses"));
        assert!(event.error_message.is_none());
    }

    #[test]
    fn test_failure_keeps_context_chain_as_details() {
        let err = anyhow::Error::new(expenseslog_core::Error::Api {
            status: 502,
            detail: None,
        })
        .context("Loading expenses");
        let event = outcome_event("expenses", &Err(err));
        assert_eq!(event.event, events::COMMAND_FAILED);
        assert_eq!(event.status_code, Some(502));
        assert_eq!(event.error_message.as_deref(), Some("Request failed (HTTP 502)"));
        assert_eq!(
            event.error_details.as_deref(),
            Some("Loading expenses: API error (HTTP 502)")
        );
    }

    #[test]
    fn test_plain_failure_has_no_duplicate_details() {
        let event = outcome_event("upload", &Err(anyhow::anyhow!("File not found")));
        assert_eq!(event.error_message.as_deref(), Some("File not found"));
        assert!(event.error_details.is_none());
    }
}
