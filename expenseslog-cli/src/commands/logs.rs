//! Logs command - inspect session activity and failures recorded locally

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use comfy_table::Cell;
use dialoguer::Confirm;
use expenseslog_core::services::{
    events, EntryPoint, FailureCount, LogEntry, LogQuery, LoggingService, SESSION_EVENTS,
};

use super::get_app_dir;
use crate::output;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent entries, optionally for one event
    List {
        /// Event name, e.g. session_timeout, auth_failure, reimbursement_submitted
        #[arg(long, short)]
        event: Option<String>,
        /// Show only failures
        #[arg(long)]
        errors: bool,
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show logins, logouts, idle timeouts and rejected credentials
    Sessions {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Count failures per endpoint or command
    Failures {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete old entries
    Prune {
        /// Delete entries older than N days
        #[arg(long, default_value = "30")]
        older_than_days: u32,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl LogsCommands {
    fn query(&self) -> Option<LogQuery> {
        match self {
            LogsCommands::List { event, errors, limit, .. } => {
                let mut query = LogQuery::recent(*limit);
                if let Some(name) = event {
                    query = query.event(name.trim().to_lowercase());
                }
                if *errors {
                    query = query.errors_only();
                }
                Some(query)
            }
            LogsCommands::Sessions { limit, .. } => Some(LogQuery::sessions(*limit)),
            _ => None,
        }
    }
}

fn get_logging_service() -> Result<LoggingService> {
    LoggingService::new(&get_app_dir()?, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

fn format_timestamp(timestamp_ms: i64) -> String {
    use chrono::{Local, TimeZone};
    Local
        .timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

/// Cutoff timestamp for `prune`, never before the epoch
fn prune_cutoff(now_ms: i64, older_than_days: u32) -> i64 {
    now_ms.saturating_sub(i64::from(older_than_days) * DAY_MS).max(0)
}

/// Where an entry happened: endpoint and status, else the command
fn describe_target(entry: &LogEntry) -> String {
    let target = entry
        .endpoint
        .as_deref()
        .or(entry.command.as_deref())
        .unwrap_or("");
    match entry.status_code {
        Some(status) if target.is_empty() => format!("HTTP {}", status),
        Some(status) => format!("{} (HTTP {})", target, status),
        None => target.to_string(),
    }
}

fn event_cell(event: &str) -> Cell {
    use comfy_table::Color;
    let color = match event {
        events::SESSION_TIMEOUT => Color::Yellow,
        events::AUTH_FAILURE | events::COMMAND_FAILED => Color::Red,
        events::LOGIN | events::REIMBURSEMENT_SUBMITTED => Color::Green,
        _ => Color::Reset,
    };
    Cell::new(event).fg(color)
}

fn print_entries(entries: &[LogEntry]) {
    let mut table = output::create_table();
    table.set_header(vec!["Time", "Event", "Where", "Error"]);
    for entry in entries {
        table.add_row(vec![
            Cell::new(format_timestamp(entry.timestamp)),
            event_cell(&entry.event),
            Cell::new(describe_target(entry)),
            Cell::new(entry.error_message.as_deref().unwrap_or("")),
        ]);
    }
    println!("{}", table);
}

fn print_failures(failures: &[FailureCount]) {
    let mut table = output::create_table();
    table.set_header(vec!["Endpoint / command", "Status", "Count", "Last seen"]);
    for failure in failures {
        table.add_row(vec![
            Cell::new(&failure.target),
            Cell::new(failure.status_code.map(|s| s.to_string()).unwrap_or_default()),
            Cell::new(failure.count),
            Cell::new(format_timestamp(failure.last_seen)),
        ]);
    }
    println!("{}", table);
}

pub fn run(command: LogsCommands) -> Result<()> {
    let query = command.query();
    match command {
        LogsCommands::List { json, .. } => {
            let service = get_logging_service()?;
            let entries = match &query {
                Some(query) => service.find(query)?,
                None => Vec::new(),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }
            if entries.is_empty() {
                println!("No log entries found.");
                return Ok(());
            }
            print_entries(&entries);
        }
        LogsCommands::Sessions { json, .. } => {
            let service = get_logging_service()?;
            let entries = match &query {
                Some(query) => service.find(query)?,
                None => Vec::new(),
            };
            let totals: Vec<(String, u64)> = service
                .event_counts()?
                .into_iter()
                .filter(|(event, _)| SESSION_EVENTS.contains(&event.as_str()))
                .collect();

            if json {
                let totals: serde_json::Map<String, serde_json::Value> = totals
                    .iter()
                    .map(|(event, n)| (event.clone(), serde_json::json!(n)))
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "totals": totals,
                        "entries": entries,
                    }))?
                );
                return Ok(());
            }

            if entries.is_empty() {
                println!("No sessions recorded yet.");
                return Ok(());
            }
            let summary = totals
                .iter()
                .map(|(event, n)| format!("{} {}", n, event))
                .collect::<Vec<_>>()
                .join(", ");
            println!("{}", summary.bold());
            print_entries(&entries);
        }
        LogsCommands::Failures { json } => {
            let service = get_logging_service()?;
            let failures = service.failure_counts()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&failures)?);
                return Ok(());
            }
            if failures.is_empty() {
                output::success("No failures recorded.");
                return Ok(());
            }
            print_failures(&failures);
        }
        LogsCommands::Prune {
            older_than_days,
            force,
            json,
        } => {
            let service = get_logging_service()?;
            let cutoff_ms = prune_cutoff(chrono::Utc::now().timestamp_millis(), older_than_days);

            if !force && !json {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Delete log entries older than {} days?", older_than_days))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let deleted = service.delete_before(cutoff_ms)?;
            if json {
                println!("{}", serde_json::json!({ "deleted": deleted }));
            } else {
                println!("Deleted {} log entries", deleted);
                println!("{}", service.db_path().display().to_string().dimmed());
            }
        }
    }

    Ok(())
}
