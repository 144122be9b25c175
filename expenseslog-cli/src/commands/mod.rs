//! CLI command implementations

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod expenses;
pub mod history;
pub mod logs;
pub mod shell;
pub mod upload;

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use expenseslog_core::ports::TOKEN_KEY;
use expenseslog_core::services::{EntryPoint, LoggingService};
use expenseslog_core::{ExpensesLogContext, InteractionEvent, SessionStatus, User};

use crate::output;

/// Get the app directory from `EXPENSESLOG_DIR` or `~/.expenseslog`
pub fn get_app_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("EXPENSESLOG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    Ok(dirs::home_dir()
        .context("Could not find home directory")?
        .join(".expenseslog"))
}

/// Get the event log for this invocation
///
/// Returns None if it fails to open (logging never blocks a command)
pub fn get_logger(entry_point: EntryPoint) -> Option<Arc<LoggingService>> {
    let app_dir = get_app_dir().ok()?;
    LoggingService::new(&app_dir, entry_point, env!("CARGO_PKG_VERSION"))
        .ok()
        .map(Arc::new)
}

/// Build the context around the app directory
pub fn get_context(logger: Option<Arc<LoggingService>>) -> Result<ExpensesLogContext> {
    let app_dir = get_app_dir()?;
    std::fs::create_dir_all(&app_dir)
        .with_context(|| format!("Failed to create app directory: {:?}", app_dir))?;

    ExpensesLogContext::new(&app_dir, logger).context("Failed to initialize ExpensesLog")
}

/// Resolve the stored session and count this command as activity.
///
/// Fails with a login hint when there is no usable session.
pub async fn require_session(ctx: &ExpensesLogContext) -> Result<User> {
    let had_token = ctx.store.get(TOKEN_KEY)?.is_some();

    let bar = output::spinner("Checking session...");
    let restored = ctx.session.restore().await;
    bar.finish_and_clear();
    let state = restored?;

    match (state.status(), state.user()) {
        (SessionStatus::Authenticated, Some(user)) => {
            ctx.session.record_activity(InteractionEvent::KeyPress);
            Ok(user.clone())
        }
        _ if had_token => {
            let minutes = ctx.config.idle_threshold.as_secs() / 60;
            anyhow::bail!(
                "Session ended after {} minutes of inactivity. Run 'el login' to sign in again.",
                minutes
            )
        }
        _ => anyhow::bail!("Not logged in. Run 'el login' first."),
    }
}

/// Split ID input on newlines if present, otherwise on commas
pub fn parse_id_list(input: &str) -> Result<Vec<i64>> {
    let trimmed = input.trim();
    let parts: Vec<&str> = if trimmed.contains('\n') {
        trimmed.lines().collect()
    } else {
        trimmed.split(',').collect()
    };

    parts
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .with_context(|| format!("Invalid expense ID '{}'", s))
        })
        .collect()
}

/// IDs from the flag, or piped on stdin when the flag is empty
pub fn ids_or_stdin(ids: Vec<i64>) -> Result<Vec<i64>> {
    if !ids.is_empty() || !atty::isnt(atty::Stream::Stdin) {
        return Ok(ids);
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_id_list(&buffer)
}
