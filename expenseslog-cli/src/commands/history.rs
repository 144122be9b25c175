//! History command - past reimbursements and what they covered

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use comfy_table::Cell;
use expenseslog_core::services::LoggingService;
use rust_decimal::Decimal;

use super::{get_context, require_session};
use crate::output;

pub async fn run(id: Option<i64>, json: bool, logger: Option<Arc<LoggingService>>) -> Result<()> {
    let ctx = get_context(logger)?;
    require_session(&ctx).await?;

    match id {
        Some(id) => show_items(&ctx, id, json).await,
        None => show_history(&ctx, json).await,
    }
}

async fn show_history(ctx: &expenseslog_core::ExpensesLogContext, json: bool) -> Result<()> {
    let bar = output::spinner("Loading reimbursements...");
    let result = ctx.reimbursement_service.history().await;
    bar.finish_and_clear();
    let history = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.is_empty() {
        println!("No reimbursements yet.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["ID", "Date", "Amount", "Note"]);
    for r in &history {
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(output::format_date(&r.date)),
            Cell::new(output::format_amount(r.amount)),
            Cell::new(r.note.as_deref().unwrap_or("")),
        ]);
    }
    println!("{}", table);

    let total: Decimal = history.iter().map(|r| r.amount).sum();
    println!(
        "{} reimbursement(s), {} in total",
        history.len(),
        output::format_amount(total).bold()
    );
    println!("{}", "Use --id <ID> to see the expenses a reimbursement covered.".dimmed());
    Ok(())
}

async fn show_items(ctx: &expenseslog_core::ExpensesLogContext, id: i64, json: bool) -> Result<()> {
    let bar = output::spinner(&format!("Loading reimbursement #{}...", id));
    let result = ctx.reimbursement_service.items(id).await;
    bar.finish_and_clear();
    let items = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("Reimbursement #{} covers no expenses.", id);
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["ID", "Date", "Description", "Amount", "Applied", "Source"]);
    for item in &items {
        table.add_row(vec![
            Cell::new(item.id),
            Cell::new(output::format_date(&item.date)),
            Cell::new(&item.description),
            Cell::new(output::format_amount(item.amount)),
            Cell::new(output::format_amount(item.applied)),
            Cell::new(&item.source),
        ]);
    }
    println!("{}", table);
    Ok(())
}
