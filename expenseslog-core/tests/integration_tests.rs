//! Integration tests for expenseslog-core services
//!
//! The backend is faked at the `ExpenseApi` trait level; session state,
//! selection and aggregation run for real against an in-memory client store.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use tempfile::TempDir;

use expenseslog_core::adapters::MemoryStore;
use expenseslog_core::config::Config;
use expenseslog_core::domain::result::{Error, Result};
use expenseslog_core::domain::{
    AccessToken, Credentials, Expense, ExpenseStatus, FilterCriteria, InteractionEvent,
    ReimbursedItem, Reimbursement, SessionStatus, SignupForm, SortKey, SortOrder, Summary,
    UploadSummary, User,
};
use expenseslog_core::ports::{ClientStore, ExpenseApi, LAST_ACTIVITY_KEY, TOKEN_KEY};
use expenseslog_core::services::session::unix_ms;
use expenseslog_core::services::{
    eligible_ids, fetch_all, Category, DashboardService, EntryPoint, ExpenseListService,
    FetchOutcome, IdlePolicy, LoggingService, SessionManager, FULL_FETCH_LIMIT,
};
use expenseslog_core::ExpensesLogContext;

const GOOD_TOKEN: &str = "good_token";
const THIRTY_MINUTES_MS: i64 = 30 * 60 * 1000;

// ============================================================================
// Test Helpers
// ============================================================================

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn expense(id: i64, description: &str, amount: i64) -> Expense {
    Expense::new(id, at(2024, 3, id as u32 % 28 + 1), description, Decimal::new(amount, 0))
}

/// In-memory backend. Tokens starting with `good` are valid until revoked.
struct FakeApi {
    store: Arc<MemoryStore>,
    expenses: Mutex<Vec<Expense>>,
    revoked: AtomicBool,
    me_calls: AtomicUsize,
    list_calls: Mutex<Vec<FilterCriteria>>,
    list_delays: Mutex<VecDeque<Duration>>,
    submissions: Mutex<Vec<(Vec<i64>, Option<String>)>>,
}

impl FakeApi {
    fn new(store: Arc<MemoryStore>, expenses: Vec<Expense>) -> Arc<Self> {
        Arc::new(Self {
            store,
            expenses: Mutex::new(expenses),
            revoked: AtomicBool::new(false),
            me_calls: AtomicUsize::new(0),
            list_calls: Mutex::new(Vec::new()),
            list_delays: Mutex::new(VecDeque::new()),
            submissions: Mutex::new(Vec::new()),
        })
    }

    fn authorize(&self) -> Result<()> {
        let token = self.store.get(TOKEN_KEY)?.unwrap_or_default();
        if self.revoked.load(Ordering::SeqCst) || !token.starts_with("good") {
            return Err(Error::Unauthorized {
                detail: Some("Could not validate credentials".to_string()),
            });
        }
        Ok(())
    }

    fn list_calls(&self) -> Vec<FilterCriteria> {
        self.list_calls.lock().unwrap().clone()
    }

    fn submissions(&self) -> Vec<(Vec<i64>, Option<String>)> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExpenseApi for FakeApi {
    async fn signup(&self, _form: &SignupForm) -> Result<AccessToken> {
        Ok(AccessToken {
            access_token: GOOD_TOKEN.to_string(),
            token_type: "bearer".to_string(),
        })
    }

    async fn login(&self, credentials: &Credentials) -> Result<AccessToken> {
        if credentials.password != "secret123" {
            return Err(Error::Unauthorized {
                detail: Some("Invalid email or password".to_string()),
            });
        }
        Ok(AccessToken {
            access_token: GOOD_TOKEN.to_string(),
            token_type: "bearer".to_string(),
        })
    }

    async fn google_login(&self, _id_token: &str) -> Result<AccessToken> {
        Ok(AccessToken {
            access_token: GOOD_TOKEN.to_string(),
            token_type: "bearer".to_string(),
        })
    }

    async fn me(&self) -> Result<User> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        self.authorize()?;
        Ok(User::new(1, "Asha", "asha@example.com"))
    }

    async fn upload_statement(&self, _file_name: &str, _bytes: Vec<u8>) -> Result<UploadSummary> {
        self.authorize()?;
        Ok(UploadSummary {
            uploaded: 0,
            existing: 0,
            new_added: 0,
        })
    }

    async fn list_expenses(&self, criteria: &FilterCriteria) -> Result<Vec<Expense>> {
        self.list_calls.lock().unwrap().push(criteria.clone());
        let delay = self.list_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.authorize()?;

        let expenses = self.expenses.lock().unwrap().clone();
        let skip = criteria.skip.unwrap_or(0) as usize;
        let limit = criteria.limit.map_or(usize::MAX, |l| l as usize);
        Ok(expenses
            .into_iter()
            .filter(|e| criteria.status.map_or(true, |status| e.status == status))
            .skip(skip)
            .take(limit)
            .collect())
    }

    async fn create_reimbursement(
        &self,
        expense_ids: &[i64],
        note: Option<&str>,
    ) -> Result<Reimbursement> {
        self.authorize()?;
        self.submissions
            .lock()
            .unwrap()
            .push((expense_ids.to_vec(), note.map(str::to_string)));

        let mut total = Decimal::ZERO;
        for e in self.expenses.lock().unwrap().iter_mut() {
            if expense_ids.contains(&e.id) {
                total += e.outstanding();
                e.reimbursed_amount = e.amount;
                e.status = ExpenseStatus::Reimbursed;
            }
        }
        Ok(Reimbursement {
            id: 1,
            date: at(2024, 4, 1),
            amount: total,
            note: note.map(str::to_string),
            created_at: None,
        })
    }

    async fn list_reimbursements(&self) -> Result<Vec<Reimbursement>> {
        self.authorize()?;
        Ok(Vec::new())
    }

    async fn reimbursement_items(&self, _reimbursement_id: i64) -> Result<Vec<ReimbursedItem>> {
        self.authorize()?;
        Ok(Vec::new())
    }

    async fn summary(&self) -> Result<Summary> {
        self.authorize()?;
        let expenses = self.expenses.lock().unwrap();
        let spent: Decimal = expenses.iter().filter(|e| e.is_debit()).map(|e| e.amount).sum();
        let reimbursed: Decimal = expenses.iter().map(|e| e.reimbursed_amount).sum();
        Ok(Summary {
            total_spent: spent,
            total_reimbursed: reimbursed,
            total_pending: spent - reimbursed,
            last_reimbursement_date: None,
        })
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    api: Arc<FakeApi>,
    session: Arc<SessionManager>,
    expenses: ExpenseListService,
}

fn harness(policy: IdlePolicy, expenses: Vec<Expense>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let api = FakeApi::new(store.clone(), expenses);
    let session = SessionManager::new(api.clone(), store.clone(), policy, None);
    let list = ExpenseListService::new(api.clone(), session.clone(), None);
    Harness {
        store,
        api,
        session,
        expenses: list,
    }
}

fn assert_fully_logged_out(h: &Harness) {
    assert!(h.session.current_token().is_none());
    assert!(h.session.current_user().is_none());
    assert_eq!(h.session.state().status(), SessionStatus::LoggedOut);
    assert!(h.store.get(TOKEN_KEY).unwrap().is_none());
    assert!(h.store.get(LAST_ACTIVITY_KEY).unwrap().is_none());
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn test_login_sets_token_on_success() {
    let h = harness(IdlePolicy::disabled(), vec![]);

    let user = h.session.login(GOOD_TOKEN).await.unwrap();
    assert_eq!(user.email, "asha@example.com");
    assert_eq!(h.session.current_token().as_deref(), Some(GOOD_TOKEN));
    assert_eq!(h.session.current_user(), Some(user));
    assert!(h.session.is_ready());
}

#[tokio::test]
async fn test_login_leaves_no_token_on_failure() {
    let h = harness(IdlePolicy::disabled(), vec![]);

    let err = h.session.login("stale_token").await.unwrap_err();
    assert!(err.is_auth_failure());
    assert_fully_logged_out(&h);
}

#[tokio::test]
async fn test_logout_is_total_and_idempotent() {
    let h = harness(IdlePolicy::default(), vec![]);
    h.session.login(GOOD_TOKEN).await.unwrap();
    assert!(h.session.is_monitoring());

    h.session.logout();
    assert_fully_logged_out(&h);
    assert!(!h.session.is_monitoring());

    h.session.logout();
    assert_fully_logged_out(&h);
}

#[tokio::test]
async fn test_subscribers_observe_transitions() {
    let h = harness(IdlePolicy::disabled(), vec![]);
    let mut rx = h.session.subscribe();

    h.session.login(GOOD_TOKEN).await.unwrap();
    assert!(rx.borrow_and_update().is_authenticated());

    h.session.logout();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().status(), SessionStatus::LoggedOut);
}

#[tokio::test]
async fn test_restore_without_token_logs_out() {
    let h = harness(IdlePolicy::default(), vec![]);
    let state = h.session.restore().await.unwrap();
    assert_eq!(state.status(), SessionStatus::LoggedOut);
    assert_eq!(h.api.me_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_restore_validates_persisted_token() {
    let h = harness(IdlePolicy::default(), vec![]);
    h.store.set(TOKEN_KEY, GOOD_TOKEN).unwrap();

    assert!(!h.session.is_ready());
    let state = h.session.restore().await.unwrap();
    assert!(state.is_authenticated());
    assert_eq!(state.user().map(|u| u.id), Some(1));
    // A missing stamp is written on restore
    assert!(h.store.get(LAST_ACTIVITY_KEY).unwrap().is_some());
}

#[tokio::test]
async fn test_restore_with_rejected_token_clears_it() {
    let h = harness(IdlePolicy::default(), vec![]);
    h.store.set(TOKEN_KEY, "expired_token").unwrap();

    let err = h.session.restore().await.unwrap_err();
    assert!(err.is_auth_failure());
    assert_fully_logged_out(&h);
}

#[tokio::test]
async fn test_restore_stale_session_skips_backend() {
    let h = harness(IdlePolicy::default(), vec![]);
    h.store.set(TOKEN_KEY, GOOD_TOKEN).unwrap();
    h.store
        .set(LAST_ACTIVITY_KEY, &(unix_ms() - THIRTY_MINUTES_MS - 60_000).to_string())
        .unwrap();

    let state = h.session.restore().await.unwrap();
    assert_eq!(state.status(), SessionStatus::LoggedOut);
    assert_eq!(h.api.me_calls.load(Ordering::SeqCst), 0);
    assert_fully_logged_out(&h);
}

#[tokio::test]
async fn test_password_login_and_signup() {
    let h = harness(IdlePolicy::disabled(), vec![]);

    let err = h
        .session
        .login_with_password("asha@example.com", "nope")
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Invalid email or password");
    assert_fully_logged_out(&h);

    let mismatch = SignupForm {
        name: "Asha".into(),
        email: "asha@example.com".into(),
        password: "secret123".into(),
        confirm_password: "secret124".into(),
    };
    assert!(matches!(
        h.session.signup(&mismatch).await.unwrap_err(),
        Error::Validation(_)
    ));

    h.session
        .login_with_password("asha@example.com", "secret123")
        .await
        .unwrap();
    assert!(h.session.state().is_authenticated());
}

// ============================================================================
// Idle timeout
// ============================================================================

#[tokio::test]
async fn test_idle_threshold_boundary() {
    let h = harness(IdlePolicy::default(), vec![]);
    h.session.login(GOOD_TOKEN).await.unwrap();

    let last = 1_700_000_000_000_i64;
    h.store.set(LAST_ACTIVITY_KEY, &last.to_string()).unwrap();

    // Exactly 30 minutes idle is still allowed
    assert!(!h.session.check_idle_at(last + THIRTY_MINUTES_MS));
    assert!(h.session.state().is_authenticated());

    assert!(h.session.check_idle_at(last + THIRTY_MINUTES_MS + 1));
    assert_fully_logged_out(&h);
}

#[tokio::test]
async fn test_activity_resets_idle_clock() {
    let h = harness(IdlePolicy::default(), vec![]);
    h.session.login(GOOD_TOKEN).await.unwrap();
    h.store
        .set(LAST_ACTIVITY_KEY, &(unix_ms() - THIRTY_MINUTES_MS - 1).to_string())
        .unwrap();

    h.session.record_activity(InteractionEvent::KeyPress);
    assert!(!h.session.check_idle());
    assert!(h.session.state().is_authenticated());
}

#[tokio::test]
async fn test_activity_ignored_without_session() {
    let h = harness(IdlePolicy::default(), vec![]);
    for event in InteractionEvent::ALL {
        h.session.record_activity(event);
    }
    assert!(h.store.get(LAST_ACTIVITY_KEY).unwrap().is_none());
}

#[tokio::test]
async fn test_disabled_policy_never_expires() {
    let h = harness(IdlePolicy::disabled(), vec![]);
    h.session.login(GOOD_TOKEN).await.unwrap();
    h.store.set(LAST_ACTIVITY_KEY, "0").unwrap();

    assert!(!h.session.check_idle());
    assert!(!h.session.is_monitoring());
    assert!(h.session.state().is_authenticated());
}

#[tokio::test]
async fn test_idle_monitor_logs_out_in_background() {
    let policy = IdlePolicy::new(Duration::from_secs(30 * 60), Duration::from_millis(10));
    let h = harness(policy, vec![]);
    h.session.login(GOOD_TOKEN).await.unwrap();

    let mut rx = h.session.subscribe();
    h.store
        .set(LAST_ACTIVITY_KEY, &(unix_ms() - 31 * 60 * 1000).to_string())
        .unwrap();

    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.status() == SessionStatus::LoggedOut),
    )
    .await
    .expect("idle monitor did not fire")
    .unwrap();

    assert_fully_logged_out(&h);
    assert!(!h.session.is_monitoring());
}

// ============================================================================
// Unauthorized handling
// ============================================================================

#[tokio::test]
async fn test_unauthorized_response_forces_logout() {
    let h = harness(IdlePolicy::disabled(), vec![expense(1, "Uber", 150)]);
    h.session.login(GOOD_TOKEN).await.unwrap();
    h.api.revoked.store(true, Ordering::SeqCst);

    let err = h.expenses.query(FilterCriteria::new()).await.unwrap_err();
    assert!(err.is_auth_failure());
    assert_fully_logged_out(&h);
}

#[tokio::test]
async fn test_non_auth_errors_keep_session() {
    let h = harness(IdlePolicy::disabled(), vec![]);
    h.session.login(GOOD_TOKEN).await.unwrap();

    let result: Result<()> = h.session.guard(Err(Error::Api {
        status: 500,
        detail: None,
    }));
    assert_eq!(result.unwrap_err().user_message(), "Request failed (HTTP 500)");
    assert!(h.session.state().is_authenticated());
}

// ============================================================================
// Filter & selection
// ============================================================================

#[tokio::test]
async fn test_criteria_passed_through_verbatim() {
    let h = harness(IdlePolicy::disabled(), vec![]);
    h.session.login(GOOD_TOKEN).await.unwrap();

    let criteria = FilterCriteria::new()
        .status(ExpenseStatus::Reimbursed)
        .sort(SortKey::Amount, SortOrder::Asc);
    h.expenses.query(criteria.clone()).await.unwrap();

    let sent = h.api.list_calls();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].to_query_pairs(),
        vec![
            ("status", "REIMBURSED".to_string()),
            ("sort_by", "amount".to_string()),
            ("order", "asc".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_invalid_criteria_never_sent() {
    let h = harness(IdlePolicy::disabled(), vec![]);
    h.session.login(GOOD_TOKEN).await.unwrap();

    let mut criteria = FilterCriteria::new();
    criteria.min_amount = Some(Decimal::new(500, 0));
    criteria.max_amount = Some(Decimal::new(100, 0));

    assert!(h.expenses.query(criteria).await.is_err());
    assert!(h.api.list_calls().is_empty());
}

#[tokio::test]
async fn test_older_response_is_superseded() {
    let h = harness(
        IdlePolicy::disabled(),
        vec![expense(1, "Swiggy", 300), expense(2, "Amazon", 1200)],
    );
    h.session.login(GOOD_TOKEN).await.unwrap();
    h.api
        .list_delays
        .lock()
        .unwrap()
        .extend([Duration::from_millis(100), Duration::ZERO]);

    let slow = FilterCriteria::new().search("slow");
    let fast = FilterCriteria::new().status(ExpenseStatus::Reimbursed);
    let (first, second) = tokio::join!(h.expenses.query(slow), h.expenses.query(fast.clone()));

    assert_eq!(first.unwrap(), FetchOutcome::Superseded);
    assert_eq!(second.unwrap(), FetchOutcome::Applied(vec![]));
    assert!(h.expenses.expenses().is_empty());
    assert_eq!(h.expenses.criteria(), fast);
    assert!(!h.expenses.is_loading());
}

#[tokio::test]
async fn test_toggle_rules() {
    let mut reimbursed = expense(3, "Apollo", 900);
    reimbursed.status = ExpenseStatus::Reimbursed;
    let h = harness(
        IdlePolicy::disabled(),
        vec![expense(1, "Uber", 500), expense(2, "Refund", -200), reimbursed],
    );
    h.session.login(GOOD_TOKEN).await.unwrap();
    h.expenses.query(FilterCriteria::new()).await.unwrap();

    assert!(h.expenses.toggle(1).unwrap());
    assert!(matches!(h.expenses.toggle(2), Err(Error::Validation(_))));
    assert!(matches!(h.expenses.toggle(3), Err(Error::Validation(_))));
    assert!(matches!(h.expenses.toggle(42), Err(Error::NotFound(_))));
    assert_eq!(h.expenses.selection(), vec![1]);

    assert!(!h.expenses.toggle(1).unwrap());
    assert!(h.expenses.selection().is_empty());
}

#[tokio::test]
async fn test_selection_pruned_after_refetch() {
    let h = harness(
        IdlePolicy::disabled(),
        vec![expense(1, "Uber", 500), expense(2, "Zomato", 250)],
    );
    h.session.login(GOOD_TOKEN).await.unwrap();
    h.expenses.query(FilterCriteria::new()).await.unwrap();
    assert_eq!(h.expenses.select_all_eligible(), 2);

    // Row 2 disappears from the next page of results
    h.api.expenses.lock().unwrap().retain(|e| e.id == 1);
    h.expenses.refresh().await.unwrap();
    assert_eq!(h.expenses.selection(), vec![1]);

    h.expenses.reset_filters().await.unwrap();
    assert_eq!(h.expenses.criteria(), FilterCriteria::default());
}

// ============================================================================
// Reimbursement submission
// ============================================================================

#[test]
fn test_only_selected_debits_are_eligible() {
    let expenses = vec![expense(1, "A", 500), expense(2, "B", -200), expense(3, "C", 75)];
    let selection: BTreeSet<i64> = [1, 2].into_iter().collect();
    assert_eq!(eligible_ids(&expenses, &selection), vec![1]);
}

#[tokio::test]
async fn test_empty_eligible_set_sends_nothing() {
    let h = harness(IdlePolicy::disabled(), vec![expense(2, "Refund", -200)]);
    h.session.login(GOOD_TOKEN).await.unwrap();
    h.expenses.query(FilterCriteria::new()).await.unwrap();
    assert_eq!(h.expenses.select_all_eligible(), 0);

    let err = h.expenses.submit_reimbursement(Some("March")).await.unwrap_err();
    assert!(matches!(err, Error::NoEligibleItems));
    assert!(h.api.submissions().is_empty());
}

#[tokio::test]
async fn test_submit_scenario_debit_and_credit() {
    let h = harness(
        IdlePolicy::disabled(),
        vec![expense(1, "A", 500), expense(2, "B", -200)],
    );
    h.session.login(GOOD_TOKEN).await.unwrap();
    h.expenses.query(FilterCriteria::new()).await.unwrap();
    h.expenses.select_all_eligible();

    let reimbursement = h
        .expenses
        .submit_reimbursement(Some("  March travel  "))
        .await
        .unwrap();

    assert_eq!(reimbursement.amount, Decimal::new(500, 0));
    assert_eq!(
        h.api.submissions(),
        vec![(vec![1], Some("March travel".to_string()))]
    );
    assert!(h.expenses.selection().is_empty());

    // Re-fetched under the same criteria, showing the server's new state
    let calls = h.api.list_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
    let reloaded = h.expenses.expenses();
    assert_eq!(reloaded[0].status, ExpenseStatus::Reimbursed);
}

#[tokio::test]
async fn test_rejected_submission_keeps_selection() {
    let h = harness(IdlePolicy::disabled(), vec![expense(1, "A", 500)]);
    h.session.login(GOOD_TOKEN).await.unwrap();
    h.expenses.query(FilterCriteria::new()).await.unwrap();
    h.expenses.toggle(1).unwrap();

    h.api.revoked.store(true, Ordering::SeqCst);
    let err = h.expenses.submit_reimbursement(None).await.unwrap_err();
    assert!(err.is_auth_failure());
    assert_eq!(h.expenses.selection(), vec![1]);
    assert_fully_logged_out(&h);
}

// ============================================================================
// Dashboard
// ============================================================================

#[tokio::test]
async fn test_dashboard_category_scenario() {
    let h = harness(
        IdlePolicy::disabled(),
        vec![
            expense(1, "Swiggy Order", 300),
            expense(2, "Amazon", 1200),
            expense(3, "Uber", 150),
            expense(4, "Amazon refund", -100),
        ],
    );
    h.session.login(GOOD_TOKEN).await.unwrap();

    let dashboard = DashboardService::new(h.api.clone(), h.session.clone())
        .load(5)
        .await
        .unwrap();

    assert_eq!(dashboard.categories.len(), 3);
    assert_eq!(dashboard.categories[&Category::Food], Decimal::new(300, 0));
    assert_eq!(dashboard.categories[&Category::Shopping], Decimal::new(1200, 0));
    assert_eq!(dashboard.categories[&Category::Transport], Decimal::new(150, 0));
    assert_eq!(dashboard.summary.total_spent, Decimal::new(1650, 0));
    assert_eq!(dashboard.top_payees[0].payee, "amazon");
    assert_eq!(dashboard.expense_count, 4);
}

fn uber_rides(count: i64) -> Vec<Expense> {
    (1..=count).map(|id| expense(id, "Uber", 10)).collect()
}

#[tokio::test]
async fn test_dashboard_walks_every_page() {
    let h = harness(IdlePolicy::disabled(), uber_rides(1500));
    h.session.login(GOOD_TOKEN).await.unwrap();

    let dashboard = DashboardService::new(h.api.clone(), h.session.clone())
        .load(5)
        .await
        .unwrap();

    assert_eq!(dashboard.expense_count, 1500);
    assert_eq!(dashboard.categories[&Category::Transport], Decimal::new(15000, 0));
    assert_eq!(dashboard.top_payees[0].count, 1500);

    let pages: Vec<(Option<u32>, Option<u32>)> = h
        .api
        .list_calls()
        .iter()
        .map(|c| (c.skip, c.limit))
        .collect();
    assert_eq!(
        pages,
        vec![
            (Some(0), Some(FULL_FETCH_LIMIT)),
            (Some(FULL_FETCH_LIMIT), Some(FULL_FETCH_LIMIT))
        ]
    );
}

#[tokio::test]
async fn test_full_fetch_stops_on_empty_page() {
    let h = harness(IdlePolicy::disabled(), uber_rides(2000));
    h.session.login(GOOD_TOKEN).await.unwrap();

    let rows = fetch_all(h.api.as_ref(), &FilterCriteria::new()).await.unwrap();
    assert_eq!(rows.len(), 2000);
    assert_eq!(h.api.list_calls().len(), 3);
}

#[tokio::test]
async fn test_query_all_makes_old_rows_selectable() {
    let h = harness(IdlePolicy::disabled(), uber_rides(1500));
    h.session.login(GOOD_TOKEN).await.unwrap();

    let outcome = h.expenses.query_all(FilterCriteria::new()).await.unwrap();
    assert!(outcome.is_applied());
    assert_eq!(h.expenses.expenses().len(), 1500);
    assert!(h.expenses.toggle(1400).unwrap());
    // Paging belongs to the walk, not to the stored criteria
    assert_eq!(h.expenses.criteria(), FilterCriteria::new());
}

#[tokio::test]
async fn test_full_fetch_failure_ends_session() {
    let h = harness(IdlePolicy::disabled(), uber_rides(1500));
    h.session.login(GOOD_TOKEN).await.unwrap();
    h.api.revoked.store(true, Ordering::SeqCst);

    let err = DashboardService::new(h.api.clone(), h.session.clone())
        .load(5)
        .await
        .unwrap_err();
    assert!(err.is_auth_failure());
    assert_fully_logged_out(&h);
}

// ============================================================================
// Context wiring
// ============================================================================

#[tokio::test]
async fn test_context_shares_one_session() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let api = FakeApi::new(store.clone(), vec![expense(1, "Uber", 150)]);
    let log = Arc::new(LoggingService::new(temp_dir.path(), EntryPoint::Cli, "0.1.0").unwrap());

    let ctx = ExpensesLogContext::from_parts(
        temp_dir.path(),
        Config::default(),
        api.clone(),
        store.clone(),
        Some(log.clone()),
    );

    ctx.session.login(GOOD_TOKEN).await.unwrap();
    let outcome = ctx.expense_service.query(FilterCriteria::new()).await.unwrap();
    assert!(outcome.is_applied());

    api.revoked.store(true, Ordering::SeqCst);
    assert!(ctx.reimbursement_service.history().await.is_err());
    assert!(ctx.session.current_token().is_none());

    let events: Vec<String> = log
        .get_recent(10)
        .unwrap()
        .into_iter()
        .map(|e| e.event)
        .collect();
    assert!(events.contains(&"login".to_string()));
    assert!(events.contains(&"auth_failure".to_string()));
    assert!(events.contains(&"logout".to_string()));
}
