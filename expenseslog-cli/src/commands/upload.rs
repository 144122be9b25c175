//! Upload command - send a bank statement to the backend

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use expenseslog_core::services::LoggingService;

use super::{get_context, require_session};
use crate::output;

pub async fn run(file: PathBuf, json: bool, logger: Option<Arc<LoggingService>>) -> Result<()> {
    let ctx = get_context(logger)?;
    require_session(&ctx).await?;

    let bar = output::spinner(&format!("Uploading {}...", file.display()));
    let result = ctx.statement_service.upload(&file).await;
    bar.finish_and_clear();
    let summary = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    output::success(&format!("✓ Uploaded {}", file.display()));
    println!("  Rows read:        {}", summary.uploaded);
    println!("  Already present:  {}", summary.existing);
    println!("  New expenses:     {}", summary.new_added);
    if summary.new_added == 0 {
        output::info("Nothing new in this statement.");
    }
    Ok(())
}
