//! Expenses commands - list with filters, reimburse a batch

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use colored::Colorize;
use comfy_table::{Cell, Color, Table};
use dialoguer::Confirm;
use expenseslog_core::domain::filter::FilterCriteria;
use expenseslog_core::services::LoggingService;
use expenseslog_core::{Error, Expense, ExpenseStatus, SortKey, SortOrder};
use rust_decimal::Decimal;

use super::{get_context, ids_or_stdin, require_session};
use crate::output;

/// Filter flags for `el expenses`
#[derive(Args, Debug, Default, Clone)]
pub struct FilterArgs {
    /// Search text matched against descriptions
    #[arg(long, short = 'q')]
    pub search: Option<String>,
    /// PENDING, PARTIAL or REIMBURSED
    #[arg(long)]
    pub status: Option<String>,
    /// Statement source (file name)
    #[arg(long)]
    pub source: Option<String>,
    /// Minimum amount
    #[arg(long)]
    pub min: Option<Decimal>,
    /// Maximum amount
    #[arg(long)]
    pub max: Option<Decimal>,
    /// From date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,
    /// To date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,
    /// Sort by: date, amount, created_at, description
    #[arg(long, default_value = "date")]
    pub sort: String,
    /// Sort order: asc or desc
    #[arg(long, default_value = "desc")]
    pub order: String,
    /// Rows to skip
    #[arg(long)]
    pub skip: Option<u32>,
    /// Maximum rows to return
    #[arg(long)]
    pub limit: Option<u32>,
}

impl FilterArgs {
    pub fn to_criteria(&self) -> Result<FilterCriteria> {
        let sort_by: SortKey = self.sort.parse()?;
        let order: SortOrder = self.order.parse()?;
        let status = self
            .status
            .as_deref()
            .map(str::parse::<ExpenseStatus>)
            .transpose()?;

        Ok(FilterCriteria {
            q: self.search.clone(),
            status,
            source: self.source.clone(),
            min_amount: self.min,
            max_amount: self.max,
            from_date: self.from,
            to_date: self.to,
            sort_by,
            order,
            skip: self.skip,
            limit: self.limit,
        })
    }
}

/// Render expenses; selected rows are marked when `selection` is given
pub fn expense_table(expenses: &[Expense], selection: Option<&BTreeSet<i64>>) -> Table {
    let mut table = output::create_table();
    let mut header = vec!["ID", "Date", "Description", "Amount", "Type", "Status", "Reimbursed"];
    if selection.is_some() {
        header.insert(0, "Sel");
    }
    table.set_header(header);

    for expense in expenses {
        let flow = expense.flow();
        let amount_color = if expense.is_credit() { Color::Green } else { Color::Reset };
        let mut row = vec![
            Cell::new(expense.id),
            Cell::new(output::format_date(&expense.date)),
            Cell::new(&expense.description),
            Cell::new(output::format_amount(expense.amount)).fg(amount_color),
            Cell::new(flow.label()),
            output::status_cell(expense.status),
            Cell::new(output::format_amount(expense.reimbursed_amount)),
        ];
        if let Some(selected) = selection {
            let mark = if selected.contains(&expense.id) {
                "[x]"
            } else if expense.is_selectable() {
                "[ ]"
            } else {
                ""
            };
            row.insert(0, Cell::new(mark));
        }
        table.add_row(row);
    }
    table
}

pub async fn list(args: FilterArgs, json: bool, logger: Option<Arc<LoggingService>>) -> Result<()> {
    let ctx = get_context(logger)?;
    require_session(&ctx).await?;

    let criteria = args.to_criteria()?;
    let bar = output::spinner("Loading expenses...");
    let result = ctx.expense_service.query(criteria).await;
    bar.finish_and_clear();
    result?;

    let expenses = ctx.expense_service.expenses();
    if json {
        println!("{}", serde_json::to_string_pretty(&expenses)?);
        return Ok(());
    }

    if expenses.is_empty() {
        println!("No expenses match these filters.");
        return Ok(());
    }

    println!("{}", expense_table(&expenses, None));
    let outstanding: Decimal = expenses.iter().map(Expense::outstanding).sum();
    println!(
        "{} expense(s), {} awaiting reimbursement",
        expenses.len(),
        output::format_amount(outstanding).bold()
    );
    Ok(())
}

pub async fn reimburse(
    ids: Vec<i64>,
    note: Option<String>,
    yes: bool,
    json: bool,
    logger: Option<Arc<LoggingService>>,
) -> Result<()> {
    let ids = ids_or_stdin(ids)?;
    if ids.is_empty() {
        anyhow::bail!("No expense IDs provided. Use --ids or pipe IDs from stdin.");
    }

    let ctx = get_context(logger)?;
    require_session(&ctx).await?;

    let bar = output::spinner("Loading expenses...");
    let loaded = ctx.expense_service.query_all(FilterCriteria::new()).await;
    bar.finish_and_clear();
    loaded?;

    for id in &ids {
        match ctx.expense_service.toggle(*id) {
            Ok(true) => {}
            // Listed twice: the second toggle undid the first
            Ok(false) => {
                ctx.expense_service.toggle(*id)?;
            }
            Err(e @ (Error::NotFound(_) | Error::Validation(_))) => {
                if !json {
                    output::warning(&format!("Skipping {}: {}", id, e.user_message()));
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    let eligible = ctx.expense_service.eligible();
    if eligible.is_empty() {
        return Err(Error::NoEligibleItems.into());
    }

    if !yes && !json {
        let expenses = ctx.expense_service.expenses();
        let total: Decimal = expenses
            .iter()
            .filter(|e| eligible.contains(&e.id))
            .map(|e| e.amount)
            .sum();
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Submit {} expense(s) totalling {} for reimbursement?",
                eligible.len(),
                output::format_amount(total)
            ))
            .default(true)
            .interact()
            .context("Confirmation prompt failed (use --yes when not on a terminal)")?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let bar = output::spinner("Submitting reimbursement...");
    let result = ctx.expense_service.submit_reimbursement(note.as_deref()).await;
    bar.finish_and_clear();
    let reimbursement = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reimbursement)?);
        return Ok(());
    }

    output::success(&format!(
        "✓ Reimbursement #{} recorded: {} across {} expense(s)",
        reimbursement.id,
        output::format_amount(reimbursement.amount),
        eligible.len()
    ));
    if let Some(note) = &reimbursement.note {
        println!("  Note: {}", note);
    }
    Ok(())
}
