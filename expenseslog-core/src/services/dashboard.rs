//! Dashboard aggregation
//!
//! Pure functions over an in-memory expense list. Only debits count toward
//! any total; credits (refunds, income) are skipped everywhere.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::domain::result::Result;
use crate::domain::{Expense, FilterCriteria, Summary};
use crate::ports::ExpenseApi;
use crate::services::expenses::fetch_all;
use crate::services::SessionManager;

/// Spending category derived from the description
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Category {
    Food,
    Shopping,
    Transport,
    Bills,
    Entertainment,
    Health,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Food,
        Category::Shopping,
        Category::Transport,
        Category::Bills,
        Category::Entertainment,
        Category::Health,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Shopping => "Shopping",
            Category::Transport => "Transport",
            Category::Bills => "Bills",
            Category::Entertainment => "Entertainment",
            Category::Health => "Health",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword table, tried top to bottom; first match wins.
///
/// Entertainment sits before Shopping so "Amazon Prime Video" is not
/// counted as shopping.
const KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Food,
        &[
            "swiggy", "zomato", "restaurant", "cafe", "coffee", "starbucks", "domino", "pizza",
            "mcdonald", "kfc", "burger", "bakery", "biryani", "food", "eats", "dining",
        ],
    ),
    (
        Category::Transport,
        &[
            "uber", "ola", "rapido", "metro", "irctc", "railway", "fuel", "petrol", "diesel",
            "fastag", "parking", "taxi", "cab", "redbus", "indigo", "airline", "flight",
        ],
    ),
    (
        Category::Entertainment,
        &[
            "netflix", "spotify", "prime video", "hotstar", "bookmyshow", "pvr", "inox",
            "cinema", "movie", "youtube", "steam",
        ],
    ),
    (
        Category::Bills,
        &[
            "electricity", "bescom", "airtel", "jio", "vodafone", "broadband", "recharge",
            "postpaid", "water bill", "gas", "rent", "insurance", "bill",
        ],
    ),
    (
        Category::Health,
        &[
            "apollo", "pharmacy", "medplus", "pharmeasy", "netmeds", "1mg", "hospital", "clinic",
            "doctor", "diagnostic",
        ],
    ),
    (
        Category::Shopping,
        &[
            "amazon", "flipkart", "myntra", "ajio", "meesho", "nykaa", "bigbasket", "blinkit",
            "zepto", "dmart", "decathlon", "ikea", "mall", "store", "mart",
        ],
    ),
];

/// Compiled matchers: case-insensitive, anchored at a word start
fn matchers() -> &'static [(Category, Regex)] {
    static MATCHERS: OnceLock<Vec<(Category, Regex)>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        KEYWORDS
            .iter()
            .filter_map(|(category, words)| {
                let alternation = words
                    .iter()
                    .map(|w| regex::escape(w))
                    .collect::<Vec<_>>()
                    .join("|");
                Regex::new(&format!(r"(?i)\b(?:{})", alternation))
                    .ok()
                    .map(|re| (*category, re))
            })
            .collect()
    })
}

/// Category for a description
pub fn categorize(description: &str) -> Category {
    matchers()
        .iter()
        .find(|(_, re)| re.is_match(description))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other)
}

fn debits(expenses: &[Expense]) -> impl Iterator<Item = &Expense> {
    expenses.iter().filter(|e| e.is_debit())
}

/// Total debit amount per category; categories with no spend are absent
pub fn category_totals(expenses: &[Expense]) -> BTreeMap<Category, Decimal> {
    let mut totals = BTreeMap::new();
    for expense in debits(expenses) {
        *totals
            .entry(categorize(&expense.description))
            .or_insert(Decimal::ZERO) += expense.amount;
    }
    totals
}

/// Total debit amount per `YYYY-MM`, in chronological order
pub fn monthly_totals(expenses: &[Expense]) -> BTreeMap<String, Decimal> {
    let mut totals = BTreeMap::new();
    for expense in debits(expenses) {
        *totals
            .entry(expense.date.format("%Y-%m").to_string())
            .or_insert(Decimal::ZERO) += expense.amount;
    }
    totals
}

/// Spend grouped by payee
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayeeTotal {
    pub payee: String,
    pub total: Decimal,
    pub count: usize,
}

/// Reduce a statement description to a payee name.
///
/// Lowercases, turns punctuation into spaces, drops tokens carrying digits
/// (reference numbers, UPI handles) and keeps at most three words.
pub fn normalize_payee(description: &str) -> String {
    let cleaned: String = description
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let name = cleaned
        .split_whitespace()
        .filter(|token| !token.chars().any(|c| c.is_ascii_digit()))
        .take(3)
        .collect::<Vec<_>>()
        .join(" ");

    if name.is_empty() {
        "unknown".to_string()
    } else {
        name
    }
}

/// The `n` payees with the largest debit totals, ties broken by name
pub fn top_payees(expenses: &[Expense], n: usize) -> Vec<PayeeTotal> {
    let mut grouped: BTreeMap<String, (Decimal, usize)> = BTreeMap::new();
    for expense in debits(expenses) {
        let entry = grouped
            .entry(normalize_payee(&expense.description))
            .or_insert((Decimal::ZERO, 0));
        entry.0 += expense.amount;
        entry.1 += 1;
    }

    let mut payees: Vec<PayeeTotal> = grouped
        .into_iter()
        .map(|(payee, (total, count))| PayeeTotal { payee, total, count })
        .collect();
    payees.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.payee.cmp(&b.payee)));
    payees.truncate(n);
    payees
}

/// Everything the dashboard shows
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub summary: Summary,
    pub categories: BTreeMap<Category, Decimal>,
    pub monthly: BTreeMap<String, Decimal>,
    pub top_payees: Vec<PayeeTotal>,
    pub expense_count: usize,
}

impl Dashboard {
    /// Build the aggregations over an already fetched list
    pub fn from_expenses(summary: Summary, expenses: &[Expense], top_n: usize) -> Self {
        Self {
            summary,
            categories: category_totals(expenses),
            monthly: monthly_totals(expenses),
            top_payees: top_payees(expenses, top_n),
            expense_count: expenses.len(),
        }
    }
}

/// Service that loads the dashboard
pub struct DashboardService {
    api: Arc<dyn ExpenseApi>,
    session: Arc<SessionManager>,
}

impl DashboardService {
    pub fn new(api: Arc<dyn ExpenseApi>, session: Arc<SessionManager>) -> Self {
        Self { api, session }
    }

    /// Fetch the server summary and the full ledger together, then aggregate
    pub async fn load(&self, top_n: usize) -> Result<Dashboard> {
        let criteria = FilterCriteria::new();
        let fetched = tokio::try_join!(
            self.api.summary(),
            fetch_all(self.api.as_ref(), &criteria)
        );
        let (summary, expenses) = self.session.guard(fetched)?;

        debug!(count = expenses.len(), "dashboard data loaded");
        Ok(Dashboard::from_expenses(summary, &expenses, top_n))
    }
}
