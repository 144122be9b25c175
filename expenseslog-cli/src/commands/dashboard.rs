//! Dashboard command - totals, categories, months and payees

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, CellAlignment};
use expenseslog_core::services::{Dashboard, LoggingService};

use super::{get_context, require_session};
use crate::output;

pub async fn run(top: usize, json: bool, logger: Option<Arc<LoggingService>>) -> Result<()> {
    let ctx = get_context(logger)?;
    require_session(&ctx).await?;

    let bar = output::spinner("Loading dashboard...");
    let result = ctx.dashboard_service.load(top).await;
    bar.finish_and_clear();
    let dashboard = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
    } else {
        print_dashboard(&dashboard);
    }
    Ok(())
}

fn amount_cell(amount: rust_decimal::Decimal) -> Cell {
    Cell::new(output::format_amount(amount)).set_alignment(CellAlignment::Right)
}

pub fn print_dashboard(dashboard: &Dashboard) {
    let summary = &dashboard.summary;
    println!("{}", "Summary".bold());
    println!("  Total spent:       {}", output::format_amount(summary.total_spent));
    println!("  Reimbursed:        {}", output::format_amount(summary.total_reimbursed).green());
    println!("  Pending:           {}", output::format_amount(summary.total_pending).yellow());
    match summary.last_reimbursement_date {
        Some(date) => println!("  Last reimbursed:   {}", output::format_date(&date)),
        None => println!("  Last reimbursed:   {}", "never".dimmed()),
    }
    println!();

    if dashboard.expense_count == 0 {
        println!("No expenses yet. Upload a statement with 'el upload <file>'.");
        return;
    }

    println!("{}", "Spending by category".bold());
    let mut table = output::create_table();
    table.set_header(vec!["Category", "Spent"]);
    for (category, total) in &dashboard.categories {
        table.add_row(vec![Cell::new(category), amount_cell(*total)]);
    }
    println!("{}", table);
    println!();

    println!("{}", "Spending by month".bold());
    let mut table = output::create_table();
    table.set_header(vec!["Month", "Spent"]);
    for (month, total) in &dashboard.monthly {
        table.add_row(vec![Cell::new(month), amount_cell(*total)]);
    }
    println!("{}", table);
    println!();

    if !dashboard.top_payees.is_empty() {
        println!("{}", "Top payees".bold());
        let mut table = output::create_table();
        table.set_header(vec!["Payee", "Payments", "Spent"]);
        for payee in &dashboard.top_payees {
            table.add_row(vec![
                Cell::new(&payee.payee),
                Cell::new(payee.count),
                amount_cell(payee.total),
            ]);
        }
        println!("{}", table);
    }

    println!(
        "{}",
        format!("Based on {} expense(s)", dashboard.expense_count).dimmed()
    );
}
