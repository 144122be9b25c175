//! Interactive shell - one session, filters and selection kept between commands
//!
//! The session's idle monitor keeps running while the shell waits for input,
//! so a shell left alone past the idle threshold ends on its own.

use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use expenseslog_core::domain::FilterCriteria;
use expenseslog_core::services::LoggingService;
use expenseslog_core::{
    Error, ExpenseStatus, ExpensesLogContext, InteractionEvent, SessionStatus, SortKey, SortOrder,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::expenses::expense_table;
use super::{dashboard, get_context, require_session};
use crate::output;

const HELP: &str = "\
Commands:
  list                      Show the current page with selection marks
  search [text]             Search descriptions (no text clears the search)
  status <pending|partial|reimbursed|all>
  filter key=value ...      Keys: q, status, source, min, max, from, to, skip, limit
                            (an empty value clears the key)
  sort <key> [asc|desc]     Keys: date, amount, created_at, description
  reset                     Clear every filter
  refresh                   Fetch the list again
  toggle <id> [id ...]      Select or unselect expenses
  all                       Select every eligible expense on the page
  clear                     Clear the selection
  selected                  Show what would be submitted
  submit [note]             Submit the selection for reimbursement
  dashboard                 Show totals and breakdowns
  history [id]              Show reimbursements, or the items of one
  whoami                    Show the signed-in user
  logout                    Sign out and leave the shell
  help                      Show this help
  quit                      Leave the shell (the session stays open)";

enum Step {
    Continue,
    Quit,
}

pub async fn run(logger: Option<Arc<LoggingService>>) -> Result<()> {
    let ctx = get_context(logger)?;
    let user = require_session(&ctx).await?;

    println!("{} {}", "Welcome,".green(), user.name.bold());
    println!("{}", "Type 'help' for commands.".dimmed());

    let loaded = ctx.expense_service.query(FilterCriteria::new()).await;
    report(loaded.map(|_| ()));

    let mut state_rx = ctx.session.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt(&ctx)?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if state_rx.borrow_and_update().status() == SessionStatus::LoggedOut {
                    println!();
                    print_timeout(&ctx);
                    break;
                }
                continue;
            }
        };

        // End of input
        let Some(line) = line else {
            println!();
            break;
        };

        // The machine may have slept through the monitor's ticks
        if ctx.session.check_idle() {
            print_timeout(&ctx);
            break;
        }
        ctx.session.record_activity(InteractionEvent::KeyPress);

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match execute(&ctx, trimmed).await {
            Ok(Step::Continue) => {}
            Ok(Step::Quit) => break,
            Err(e) => report::<()>(Err(e)),
        }

        if !ctx.session.state().is_authenticated() {
            output::warning("Session ended. Run 'el login' to sign in again.");
            break;
        }
    }

    Ok(())
}

fn prompt(ctx: &ExpensesLogContext) -> Result<()> {
    let selected = ctx.expense_service.selection().len();
    let marker = if selected > 0 {
        format!("el [{} selected]> ", selected)
    } else {
        "el> ".to_string()
    };
    print!("{}", marker.cyan());
    std::io::stdout().flush()?;
    Ok(())
}

fn print_timeout(ctx: &ExpensesLogContext) {
    let minutes = ctx.config.idle_threshold.as_secs() / 60;
    output::warning(&format!(
        "Session ended after {} minutes of inactivity. Run 'el login' to sign in again.",
        minutes
    ));
}

fn report<T>(result: Result<T, Error>) {
    if let Err(e) = result {
        output::error(&e.user_message());
    }
}

async fn execute(ctx: &ExpensesLogContext, line: &str) -> Result<Step, Error> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<&str> = parts.collect();

    match command.as_str() {
        "help" | "?" => println!("{}", HELP),
        "quit" | "exit" => return Ok(Step::Quit),
        "list" | "ls" => show_list(ctx),
        "refresh" => {
            ctx.expense_service.refresh().await?;
            show_list(ctx);
        }
        "reset" => {
            ctx.expense_service.reset_filters().await?;
            show_list(ctx);
        }
        "search" => {
            let mut criteria = ctx.expense_service.criteria();
            let text = args.join(" ");
            criteria.q = if text.is_empty() { None } else { Some(text) };
            requery(ctx, criteria).await?;
        }
        "status" => {
            let value = args.first().copied().unwrap_or("all");
            let mut criteria = ctx.expense_service.criteria();
            apply_filter(&mut criteria, "status", value)?;
            requery(ctx, criteria).await?;
        }
        "filter" => {
            if args.is_empty() {
                return Err(Error::validation("Usage: filter key=value ..."));
            }
            let mut criteria = ctx.expense_service.criteria();
            for arg in &args {
                let (key, value) = arg
                    .split_once('=')
                    .ok_or_else(|| Error::validation(format!("Expected key=value, got '{}'", arg)))?;
                apply_filter(&mut criteria, key, value)?;
            }
            requery(ctx, criteria).await?;
        }
        "sort" => {
            let key: SortKey = args
                .first()
                .ok_or_else(|| Error::validation("Usage: sort <key> [asc|desc]"))?
                .parse()?;
            let order: SortOrder = match args.get(1) {
                Some(o) => o.parse()?,
                None => SortOrder::default(),
            };
            let criteria = ctx.expense_service.criteria().sort(key, order);
            requery(ctx, criteria).await?;
        }
        "toggle" | "t" => {
            if args.is_empty() {
                return Err(Error::validation("Usage: toggle <id> [id ...]"));
            }
            for arg in &args {
                let id: i64 = arg
                    .parse()
                    .map_err(|_| Error::validation(format!("Invalid expense ID '{}'", arg)))?;
                match ctx.expense_service.toggle(id) {
                    Ok(true) => println!("Selected {}", id),
                    Ok(false) => println!("Unselected {}", id),
                    Err(e) => output::warning(&e.user_message()),
                }
            }
        }
        "all" => {
            let n = ctx.expense_service.select_all_eligible();
            println!("{} expense(s) selected", n);
        }
        "clear" => {
            ctx.expense_service.clear_selection();
            println!("Selection cleared");
        }
        "selected" => show_selected(ctx),
        "submit" => {
            let note = args.join(" ");
            let reimbursement = ctx
                .expense_service
                .submit_reimbursement(Some(note.as_str()))
                .await?;
            output::success(&format!(
                "✓ Reimbursement #{} recorded: {}",
                reimbursement.id,
                output::format_amount(reimbursement.amount)
            ));
        }
        "dashboard" => {
            let board = ctx.dashboard_service.load(5).await?;
            dashboard::print_dashboard(&board);
        }
        "history" => match args.first() {
            Some(raw) => {
                let id: i64 = raw
                    .parse()
                    .map_err(|_| Error::validation(format!("Invalid reimbursement ID '{}'", raw)))?;
                let items = ctx.reimbursement_service.items(id).await?;
                for item in items {
                    println!(
                        "  {:>6}  {}  {:<40}  {}",
                        item.id,
                        output::format_date(&item.date),
                        item.description,
                        output::format_amount(item.applied)
                    );
                }
            }
            None => {
                let history = ctx.reimbursement_service.history().await?;
                if history.is_empty() {
                    println!("No reimbursements yet.");
                }
                for r in history {
                    println!(
                        "  #{:<5} {}  {}  {}",
                        r.id,
                        output::format_date(&r.date),
                        output::format_amount(r.amount),
                        r.note.as_deref().unwrap_or("").dimmed()
                    );
                }
            }
        },
        "whoami" => match ctx.session.current_user() {
            Some(user) => println!("{} <{}>", user.name.bold(), user.email),
            None => println!("Not signed in"),
        },
        "logout" => {
            ctx.session.logout();
            output::success("Logged out.");
            return Ok(Step::Quit);
        }
        other => {
            return Err(Error::validation(format!(
                "Unknown command '{}'. Type 'help' for commands.",
                other
            )))
        }
    }

    Ok(Step::Continue)
}

async fn requery(ctx: &ExpensesLogContext, criteria: FilterCriteria) -> Result<(), Error> {
    ctx.expense_service.query(criteria).await?;
    show_list(ctx);
    Ok(())
}

fn show_list(ctx: &ExpensesLogContext) {
    let expenses = ctx.expense_service.expenses();
    if expenses.is_empty() {
        println!("No expenses match these filters.");
        return;
    }
    let selection: BTreeSet<i64> = ctx.expense_service.selection().into_iter().collect();
    println!("{}", expense_table(&expenses, Some(&selection)));
    println!("{} expense(s)", expenses.len());
}

fn show_selected(ctx: &ExpensesLogContext) {
    let eligible = ctx.expense_service.eligible();
    if eligible.is_empty() {
        println!("Nothing selected.");
        return;
    }
    let expenses: Vec<_> = ctx
        .expense_service
        .expenses()
        .into_iter()
        .filter(|e| eligible.contains(&e.id))
        .collect();
    let total: rust_decimal::Decimal = expenses.iter().map(|e| e.amount).sum();
    println!("{}", expense_table(&expenses, None));
    println!(
        "{} expense(s), {} to submit",
        expenses.len(),
        output::format_amount(total).bold()
    );
}

/// Set or clear one criteria field from `key=value` text
fn apply_filter(criteria: &mut FilterCriteria, key: &str, value: &str) -> Result<(), Error> {
    let value = value.trim();
    let cleared = value.is_empty();

    fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, Error> {
        value
            .parse()
            .map_err(|_| Error::validation(format!("Invalid value '{}' for {}", value, key)))
    }

    match key.trim().to_ascii_lowercase().as_str() {
        "q" | "search" => criteria.q = (!cleared).then(|| value.to_string()),
        "status" => {
            criteria.status = if cleared || value.eq_ignore_ascii_case("all") {
                None
            } else {
                Some(value.parse::<ExpenseStatus>()?)
            }
        }
        "source" => criteria.source = (!cleared).then(|| value.to_string()),
        "min" => criteria.min_amount = if cleared { None } else { Some(parse(key, value)?) },
        "max" => criteria.max_amount = if cleared { None } else { Some(parse(key, value)?) },
        "from" => criteria.from_date = if cleared { None } else { Some(parse(key, value)?) },
        "to" => criteria.to_date = if cleared { None } else { Some(parse(key, value)?) },
        "skip" => criteria.skip = if cleared { None } else { Some(parse(key, value)?) },
        "limit" => criteria.limit = if cleared { None } else { Some(parse(key, value)?) },
        other => {
            return Err(Error::validation(format!(
                "Unknown filter '{}' (expected q, status, source, min, max, from, to, skip or limit)",
                other
            )))
        }
    }
    Ok(())
}
