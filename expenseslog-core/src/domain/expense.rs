//! Expense domain model

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};
use super::wire;

/// Reimbursement status of an expense, as tracked by the backend ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseStatus {
    #[default]
    Pending,
    Partial,
    Reimbursed,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Pending => "PENDING",
            ExpenseStatus::Partial => "PARTIAL",
            ExpenseStatus::Reimbursed => "REIMBURSED",
        }
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpenseStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ExpenseStatus::Pending),
            "PARTIAL" => Ok(ExpenseStatus::Partial),
            "REIMBURSED" => Ok(ExpenseStatus::Reimbursed),
            other => Err(Error::validation(format!(
                "Unknown status '{}' (expected PENDING, PARTIAL or REIMBURSED)",
                other
            ))),
        }
    }
}

/// Direction of money for an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Flow {
    Debit,
    Credit,
}

impl Flow {
    pub fn label(&self) -> &'static str {
        match self {
            Flow::Debit => "Debit",
            Flow::Credit => "Credit",
        }
    }
}

/// A statement line stored by the backend.
///
/// Positive amounts are debits (money spent), negative amounts are credits
/// (refunds, income). Only debits can ever be reimbursed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    #[serde(deserialize_with = "wire::datetime")]
    pub date: NaiveDateTime,
    pub description: String,
    #[serde(deserialize_with = "wire::amount")]
    pub amount: Decimal,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub status: ExpenseStatus,
    #[serde(default, deserialize_with = "wire::amount_or_zero")]
    pub reimbursed_amount: Decimal,
    #[serde(default)]
    pub transaction_hash: String,
    #[serde(default, deserialize_with = "wire::optional_datetime")]
    pub created_at: Option<NaiveDateTime>,
}

impl Expense {
    /// Create an expense with required fields
    pub fn new(id: i64, date: NaiveDateTime, description: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id,
            date,
            description: description.into(),
            amount,
            source: String::new(),
            status: ExpenseStatus::Pending,
            reimbursed_amount: Decimal::ZERO,
            transaction_hash: String::new(),
            created_at: None,
        }
    }

    pub fn is_debit(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_credit(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// Credits are labelled as such; everything else reads as a debit
    pub fn flow(&self) -> Flow {
        if self.is_credit() {
            Flow::Credit
        } else {
            Flow::Debit
        }
    }

    /// Amount still awaiting reimbursement (never negative)
    pub fn outstanding(&self) -> Decimal {
        if !self.is_debit() {
            return Decimal::ZERO;
        }
        (self.amount - self.reimbursed_amount).max(Decimal::ZERO)
    }

    /// Whether the row may join a reimbursement batch
    pub fn is_selectable(&self) -> bool {
        self.is_debit() && self.status != ExpenseStatus::Reimbursed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_deserialize_backend_expense() {
        let json = r#"{
            "id": 12,
            "date": "2024-02-14T00:00:00",
            "description": "Swiggy Order",
            "amount": 300.0,
            "source": "ICICI CSV",
            "status": "PARTIAL",
            "reimbursed_amount": 100.0,
            "transaction_hash": "ab12",
            "created_at": "2024-02-15T08:01:02.123456"
        }"#;
        let expense: Expense = serde_json::from_str(json).unwrap();
        assert_eq!(expense.id, 12);
        assert_eq!(expense.date, at(2024, 2, 14));
        assert_eq!(expense.amount, Decimal::new(300, 0));
        assert_eq!(expense.status, ExpenseStatus::Partial);
        assert_eq!(expense.outstanding(), Decimal::new(200, 0));
        assert!(expense.created_at.is_some());
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = r#"{"id": 1, "date": "2024-02-14", "description": "Uber", "amount": "150"}"#;
        let expense: Expense = serde_json::from_str(json).unwrap();
        assert_eq!(expense.status, ExpenseStatus::Pending);
        assert_eq!(expense.reimbursed_amount, Decimal::ZERO);
        assert!(expense.created_at.is_none());
    }

    #[test]
    fn test_credit_is_never_selectable() {
        let credit = Expense::new(1, at(2024, 1, 1), "Refund", Decimal::new(-200, 0));
        assert!(credit.is_credit());
        assert_eq!(credit.flow(), Flow::Credit);
        assert!(!credit.is_selectable());
        assert_eq!(credit.outstanding(), Decimal::ZERO);
    }

    #[test]
    fn test_reimbursed_debit_not_selectable() {
        let mut debit = Expense::new(2, at(2024, 1, 1), "Amazon", Decimal::new(1200, 0));
        assert!(debit.is_selectable());
        debit.status = ExpenseStatus::Reimbursed;
        assert!(!debit.is_selectable());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("reimbursed".parse::<ExpenseStatus>().unwrap(), ExpenseStatus::Reimbursed);
        assert_eq!(" PENDING ".parse::<ExpenseStatus>().unwrap(), ExpenseStatus::Pending);
        assert!("done".parse::<ExpenseStatus>().is_err());
    }
}
