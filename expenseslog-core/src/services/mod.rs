//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

pub mod dashboard;
mod expenses;
pub mod logging;
mod reimbursement;
pub mod session;
mod statement;

pub use dashboard::{Category, Dashboard, DashboardService, PayeeTotal};
pub use expenses::{eligible_ids, fetch_all, ExpenseListService, FetchOutcome, FULL_FETCH_LIMIT};
pub use logging::{
    events, EntryPoint, FailureCount, LogEntry, LogEvent, LogQuery, LoggingService, SESSION_EVENTS,
};
pub use reimbursement::ReimbursementService;
pub use session::{IdlePolicy, SessionManager};
pub use statement::{validate_statement_path, StatementService, SUPPORTED_EXTENSIONS};
