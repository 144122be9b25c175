//! Expense list service - filtering, selection and batch reimbursement
//!
//! The backend owns filtering and ordering: every query is a fresh fetch
//! with the criteria passed through untouched. Responses are tagged with a
//! request generation so a slow, older query can never overwrite the
//! results of a newer one.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{Expense, ExpenseStatus, FilterCriteria, Reimbursement};
use crate::ports::ExpenseApi;
use crate::services::logging::{events, LogEvent, LoggingService};
use crate::services::SessionManager;

/// What happened to the response of a query
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The response became the loaded list
    Applied(Vec<Expense>),
    /// A newer query was issued meanwhile; the response was discarded
    Superseded,
}

impl FetchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, FetchOutcome::Applied(_))
    }
}

#[derive(Debug, Default)]
struct ListState {
    criteria: FilterCriteria,
    expenses: Vec<Expense>,
    selection: BTreeSet<i64>,
}

/// Decrements the in-flight counter when a fetch ends, however it ends
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn start(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// IDs that may be submitted: selected, loaded, and a debit.
///
/// Returned in loaded-list order.
pub fn eligible_ids(expenses: &[Expense], selection: &BTreeSet<i64>) -> Vec<i64> {
    expenses
        .iter()
        .filter(|e| selection.contains(&e.id) && e.is_debit())
        .map(|e| e.id)
        .collect()
}

/// Page size used when walking the whole ledger
pub const FULL_FETCH_LIMIT: u32 = 1000;

/// Fetch every page matching `criteria`, `FULL_FETCH_LIMIT` rows at a time.
///
/// Stops at the first page shorter than the page size. Errors are returned
/// unguarded; callers pass them through [`SessionManager::guard`].
pub async fn fetch_all(api: &dyn ExpenseApi, criteria: &FilterCriteria) -> Result<Vec<Expense>> {
    let mut all = Vec::new();
    let mut skip = 0u32;
    loop {
        let page = criteria.clone().page(skip, FULL_FETCH_LIMIT);
        let rows = api.list_expenses(&page).await?;
        let fetched = rows.len();
        all.extend(rows);
        if fetched < FULL_FETCH_LIMIT as usize {
            break;
        }
        skip = match skip.checked_add(FULL_FETCH_LIMIT) {
            Some(next) => next,
            None => break,
        };
    }
    debug!(count = all.len(), "fetched full ledger");
    Ok(all)
}

/// Service for the filterable expense list and its selection
pub struct ExpenseListService {
    api: Arc<dyn ExpenseApi>,
    session: Arc<SessionManager>,
    state: Mutex<ListState>,
    generation: AtomicU64,
    in_flight: AtomicUsize,
    event_log: Option<Arc<LoggingService>>,
}

impl ExpenseListService {
    pub fn new(
        api: Arc<dyn ExpenseApi>,
        session: Arc<SessionManager>,
        event_log: Option<Arc<LoggingService>>,
    ) -> Self {
        Self {
            api,
            session,
            state: Mutex::new(ListState::default()),
            generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            event_log,
        }
    }

    fn state(&self) -> MutexGuard<'_, ListState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fetch the list for `criteria` and make them the current criteria
    pub async fn query(&self, criteria: FilterCriteria) -> Result<FetchOutcome> {
        self.load(criteria, false).await
    }

    /// Like [`query`](Self::query), but walks every page so the loaded list
    /// holds the whole matching ledger. Paging fields in `criteria` are ignored.
    pub async fn query_all(&self, criteria: FilterCriteria) -> Result<FetchOutcome> {
        self.load(criteria, true).await
    }

    async fn load(&self, criteria: FilterCriteria, all_pages: bool) -> Result<FetchOutcome> {
        criteria.validate()?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state().criteria = criteria.clone();

        let result = {
            let _loading = InFlight::start(&self.in_flight);
            debug!(generation, all_pages, "querying expenses");
            let fetched = if all_pages {
                fetch_all(self.api.as_ref(), &criteria).await
            } else {
                self.api.list_expenses(&criteria).await
            };
            self.session.guard(fetched)
        };

        let mut state = self.state();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "discarding superseded expense response");
            return Ok(FetchOutcome::Superseded);
        }

        let expenses = result?;
        let selectable: BTreeSet<i64> = expenses
            .iter()
            .filter(|e| e.is_selectable())
            .map(|e| e.id)
            .collect();
        state.selection.retain(|id| selectable.contains(id));
        state.expenses = expenses.clone();

        debug!(count = expenses.len(), "expense list applied");
        Ok(FetchOutcome::Applied(expenses))
    }

    /// Re-run the current criteria
    pub async fn refresh(&self) -> Result<FetchOutcome> {
        let criteria = self.criteria();
        self.query(criteria).await
    }

    /// Back to default criteria (date, newest first, no filters)
    pub async fn reset_filters(&self) -> Result<FetchOutcome> {
        self.query(FilterCriteria::default()).await
    }

    /// Flip selection of a loaded expense; returns whether it is now selected
    pub fn toggle(&self, id: i64) -> Result<bool> {
        let mut state = self.state();
        let expense = state
            .expenses
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::not_found(format!("Expense {} is not in the current list", id)))?;

        if !expense.is_debit() {
            return Err(Error::validation(format!(
                "Expense {} is not a debit and cannot be reimbursed",
                id
            )));
        }
        if expense.status == ExpenseStatus::Reimbursed {
            return Err(Error::validation(format!(
                "Expense {} is already fully reimbursed",
                id
            )));
        }

        if state.selection.remove(&id) {
            Ok(false)
        } else {
            state.selection.insert(id);
            Ok(true)
        }
    }

    /// Select every loaded row that can be reimbursed; returns the selection size
    pub fn select_all_eligible(&self) -> usize {
        let mut state = self.state();
        let ids: Vec<i64> = state
            .expenses
            .iter()
            .filter(|e| e.is_selectable())
            .map(|e| e.id)
            .collect();
        state.selection.extend(ids);
        state.selection.len()
    }

    pub fn clear_selection(&self) {
        self.state().selection.clear();
    }

    pub fn selection(&self) -> Vec<i64> {
        self.state().selection.iter().copied().collect()
    }

    pub fn expenses(&self) -> Vec<Expense> {
        self.state().expenses.clone()
    }

    pub fn criteria(&self) -> FilterCriteria {
        self.state().criteria.clone()
    }

    /// True while any fetch is outstanding
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Selected debits currently eligible for submission
    pub fn eligible(&self) -> Vec<i64> {
        let state = self.state();
        eligible_ids(&state.expenses, &state.selection)
    }

    /// Submit the eligible selection as one reimbursement.
    ///
    /// Nothing is sent when no selected row is a debit. On success the
    /// selection is cleared and the list re-fetched under the same criteria.
    pub async fn submit_reimbursement(&self, note: Option<&str>) -> Result<Reimbursement> {
        let (ids, criteria) = {
            let state = self.state();
            (
                eligible_ids(&state.expenses, &state.selection),
                state.criteria.clone(),
            )
        };

        if ids.is_empty() {
            return Err(Error::NoEligibleItems);
        }

        let note = note.map(str::trim).filter(|n| !n.is_empty());
        let reimbursement = self
            .session
            .guard(self.api.create_reimbursement(&ids, note).await)?;

        self.clear_selection();
        info!(
            reimbursement_id = reimbursement.id,
            items = ids.len(),
            "reimbursement submitted"
        );
        if let Some(log) = &self.event_log {
            log.record(LogEvent::new(events::REIMBURSEMENT_SUBMITTED).with_endpoint("/reimbursements/"));
        }

        if let Err(e) = self.query(criteria).await {
            warn!(error = %e, "failed to reload expenses after reimbursement");
        }

        Ok(reimbursement)
    }
}
