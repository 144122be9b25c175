//! Reimbursement domain models

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::wire;

/// A reimbursement recorded by the backend ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reimbursement {
    pub id: i64,
    #[serde(deserialize_with = "wire::datetime")]
    pub date: NaiveDateTime,
    #[serde(deserialize_with = "wire::amount")]
    pub amount: Decimal,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "wire::optional_datetime")]
    pub created_at: Option<NaiveDateTime>,
}

/// Request body for `POST /reimbursements/`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReimbursementRequest {
    pub expense_ids: Vec<i64>,
    pub note: Option<String>,
}

/// An expense covered by a reimbursement, with the amount applied to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReimbursedItem {
    pub id: i64,
    #[serde(deserialize_with = "wire::datetime")]
    pub date: NaiveDateTime,
    pub description: String,
    #[serde(deserialize_with = "wire::amount")]
    pub amount: Decimal,
    #[serde(default, deserialize_with = "wire::amount_or_zero")]
    pub applied: Decimal,
    #[serde(default)]
    pub source: String,
}
