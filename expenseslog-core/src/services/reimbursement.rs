//! Reimbursement history service

use std::sync::Arc;

use crate::domain::result::Result;
use crate::domain::{ReimbursedItem, Reimbursement};
use crate::ports::ExpenseApi;
use crate::services::SessionManager;

/// Read access to past reimbursements
pub struct ReimbursementService {
    api: Arc<dyn ExpenseApi>,
    session: Arc<SessionManager>,
}

impl ReimbursementService {
    pub fn new(api: Arc<dyn ExpenseApi>, session: Arc<SessionManager>) -> Self {
        Self { api, session }
    }

    /// All reimbursements, in the order the backend returns them
    pub async fn history(&self) -> Result<Vec<Reimbursement>> {
        self.session.guard(self.api.list_reimbursements().await)
    }

    /// Expenses covered by one reimbursement
    pub async fn items(&self, reimbursement_id: i64) -> Result<Vec<ReimbursedItem>> {
        self.session
            .guard(self.api.reimbursement_items(reimbursement_id).await)
    }
}
