//! Statement upload service

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::domain::result::{Error, Result};
use crate::domain::UploadSummary;
use crate::ports::ExpenseApi;
use crate::services::logging::{events, LogEvent, LoggingService};
use crate::services::SessionManager;

/// File extensions the backend can parse
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "csv"];

/// Check that `path` names a statement format the backend accepts
pub fn validate_statement_path(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(Error::validation(format!(
            "Unsupported statement file '{}': only PDF or CSV files can be uploaded",
            path.display()
        ))),
    }
}

/// Uploads bank statements for parsing
pub struct StatementService {
    api: Arc<dyn ExpenseApi>,
    session: Arc<SessionManager>,
    event_log: Option<Arc<LoggingService>>,
}

impl StatementService {
    pub fn new(
        api: Arc<dyn ExpenseApi>,
        session: Arc<SessionManager>,
        event_log: Option<Arc<LoggingService>>,
    ) -> Self {
        Self {
            api,
            session,
            event_log,
        }
    }

    /// Read and upload a statement file
    pub async fn upload(&self, path: &Path) -> Result<UploadSummary> {
        validate_statement_path(path)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::validation("Statement path has no file name"))?;
        let bytes = tokio::fs::read(path).await?;

        let summary = self
            .session
            .guard(self.api.upload_statement(&file_name, bytes).await)?;

        info!(
            uploaded = summary.uploaded,
            new_added = summary.new_added,
            "statement uploaded"
        );
        if let Some(log) = &self.event_log {
            log.record(LogEvent::new(events::STATEMENT_UPLOADED).with_endpoint("/statements/upload"));
        }
        Ok(summary)
    }
}
