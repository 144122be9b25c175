//! ExpensesLog Core - client logic for tracking and reimbursing expenses
//!
//! This crate implements the client following hexagonal architecture:
//!
//! - **domain**: Entities and value types (Expense, FilterCriteria, SessionState, ...)
//! - **ports**: Trait definitions for external dependencies (ExpenseApi, ClientStore)
//! - **services**: Session lifecycle, expense selection, dashboard, uploads
//! - **adapters**: Concrete implementations (HTTP gateway, JSON file store)

pub mod adapters;
pub mod config;
pub mod domain;
mod log_migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::{HttpGateway, JsonFileStore};
use config::Config;
use ports::{ClientStore, ExpenseApi};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{
    Expense, ExpenseStatus, FilterCriteria, InteractionEvent, Reimbursement, SessionState,
    SessionStatus, SortKey, SortOrder, Summary, User,
};

/// Main context for ExpensesLog operations
///
/// Wires the gateway, the client store and every service around one
/// shared session manager.
pub struct ExpensesLogContext {
    pub config: Config,
    pub app_dir: PathBuf,
    pub store: Arc<dyn ClientStore>,
    pub api: Arc<dyn ExpenseApi>,
    pub session: Arc<SessionManager>,
    pub expense_service: ExpenseListService,
    pub reimbursement_service: ReimbursementService,
    pub statement_service: StatementService,
    pub dashboard_service: DashboardService,
}

impl ExpensesLogContext {
    /// Create a context backed by `session.json` and the configured backend
    pub fn new(app_dir: &Path, event_log: Option<Arc<LoggingService>>) -> Result<Self> {
        let config = Config::load(app_dir).context("Failed to load settings")?;

        let store: Arc<dyn ClientStore> = Arc::new(JsonFileStore::new(app_dir));
        let api: Arc<dyn ExpenseApi> = Arc::new(HttpGateway::with_timeout(
            &config.base_url,
            config.timeout,
            Arc::clone(&store),
        )?);

        Ok(Self::from_parts(app_dir, config, api, store, event_log))
    }

    /// Assemble a context around existing adapters
    pub fn from_parts(
        app_dir: &Path,
        config: Config,
        api: Arc<dyn ExpenseApi>,
        store: Arc<dyn ClientStore>,
        event_log: Option<Arc<LoggingService>>,
    ) -> Self {
        let session = SessionManager::new(
            Arc::clone(&api),
            Arc::clone(&store),
            config.idle_policy(),
            event_log.clone(),
        );

        let expense_service =
            ExpenseListService::new(Arc::clone(&api), Arc::clone(&session), event_log.clone());
        let reimbursement_service = ReimbursementService::new(Arc::clone(&api), Arc::clone(&session));
        let statement_service =
            StatementService::new(Arc::clone(&api), Arc::clone(&session), event_log);
        let dashboard_service = DashboardService::new(Arc::clone(&api), Arc::clone(&session));

        Self {
            config,
            app_dir: app_dir.to_path_buf(),
            store,
            api,
            session,
            expense_service,
            reimbursement_service,
            statement_service,
            dashboard_service,
        }
    }
}
