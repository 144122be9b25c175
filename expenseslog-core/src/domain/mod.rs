//! Core domain entities
//!
//! All client-side entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod expense;
pub mod filter;
mod reimbursement;
pub mod result;
mod session;
mod summary;
mod user;
pub mod wire;

pub use expense::{Expense, ExpenseStatus, Flow};
pub use filter::{FilterCriteria, SortKey, SortOrder};
pub use reimbursement::{ReimbursedItem, Reimbursement, ReimbursementRequest};
pub use session::{InteractionEvent, SessionState, SessionStatus};
pub use summary::{Summary, UploadSummary};
pub use user::{AccessToken, Credentials, SignupForm, User, MIN_PASSWORD_LEN};
