//! Backend API port
//!
//! Defines the REST surface the client consumes. The HTTP gateway implements
//! it against the real backend; tests implement it in memory.

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::{
    AccessToken, Credentials, Expense, FilterCriteria, ReimbursedItem, Reimbursement,
    SignupForm, Summary, UploadSummary, User,
};

/// Backend API trait
///
/// Implementations attach credentials themselves; callers never choose
/// whether a request is authenticated.
#[async_trait]
pub trait ExpenseApi: Send + Sync {
    /// `POST /auth/signup`
    async fn signup(&self, form: &SignupForm) -> Result<AccessToken>;

    /// `POST /auth/login`
    async fn login(&self, credentials: &Credentials) -> Result<AccessToken>;

    /// `POST /auth/google` with a Google ID token
    async fn google_login(&self, id_token: &str) -> Result<AccessToken>;

    /// `GET /auth/me`
    async fn me(&self) -> Result<User>;

    /// `POST /statements/upload` (multipart field `file`)
    async fn upload_statement(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadSummary>;

    /// `GET /expenses/`
    async fn list_expenses(&self, criteria: &FilterCriteria) -> Result<Vec<Expense>>;

    /// `POST /reimbursements/`
    async fn create_reimbursement(
        &self,
        expense_ids: &[i64],
        note: Option<&str>,
    ) -> Result<Reimbursement>;

    /// `GET /reimbursements/`
    async fn list_reimbursements(&self) -> Result<Vec<Reimbursement>>;

    /// `GET /reimbursements/{id}/items`
    async fn reimbursement_items(&self, reimbursement_id: i64) -> Result<Vec<ReimbursedItem>>;

    /// `GET /summary/`
    async fn summary(&self) -> Result<Summary>;
}
