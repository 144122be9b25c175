//! Statement upload and account summary models

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::wire;

/// Outcome of a statement upload, as counted by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub uploaded: i64,
    pub existing: i64,
    pub new_added: i64,
}

/// Server-computed totals from `GET /summary/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(deserialize_with = "wire::amount_or_zero")]
    pub total_spent: Decimal,
    #[serde(deserialize_with = "wire::amount_or_zero")]
    pub total_reimbursed: Decimal,
    #[serde(deserialize_with = "wire::amount_or_zero")]
    pub total_pending: Decimal,
    #[serde(default, deserialize_with = "wire::optional_datetime")]
    pub last_reimbursement_date: Option<NaiveDateTime>,
}
