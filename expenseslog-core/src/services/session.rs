//! Session manager - authentication lifecycle and idle timeout
//!
//! Owns the in-memory session state and keeps the persisted token and
//! activity stamp in step with it. The state is published through a
//! `tokio::sync::watch` channel so views can wait for the session to resolve.
//!
//! Invariants:
//! - after `logout()` neither a token nor a user is held, in memory or on disk
//! - `Authenticated` is only ever entered with a user fetched for that token
//! - an unauthorized response from any guarded request ends the session

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{Credentials, InteractionEvent, SessionState, SessionStatus, SignupForm, User};
use crate::ports::{ClientStore, ExpenseApi, LAST_ACTIVITY_KEY, TOKEN_KEY};
use crate::services::logging::{events, LogEvent, LoggingService};

/// Default inactivity threshold
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(30 * 60);

/// Default period between idle checks
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest period the idle monitor ticks at; a zero period would panic the timer
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Current time as unix milliseconds
pub fn unix_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Inactivity policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdlePolicy {
    pub enabled: bool,
    /// Sessions idle for strictly longer than this are ended
    pub threshold: Duration,
    pub check_interval: Duration,
}

impl IdlePolicy {
    pub fn new(threshold: Duration, check_interval: Duration) -> Self {
        Self {
            enabled: true,
            threshold,
            check_interval: check_interval.max(MIN_CHECK_INTERVAL),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// True when the gap between `last_activity_ms` and `now_ms` exceeds the threshold
    pub fn is_expired(&self, last_activity_ms: i64, now_ms: i64) -> bool {
        let threshold_ms = i64::try_from(self.threshold.as_millis()).unwrap_or(i64::MAX);
        self.enabled && now_ms.saturating_sub(last_activity_ms) > threshold_ms
    }
}

impl Default for IdlePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_THRESHOLD, DEFAULT_CHECK_INTERVAL)
    }
}

/// Handle to the periodic idle check; dropping it stops the task
struct IdleMonitor {
    cancel: CancellationToken,
    _handle: JoinHandle<()>,
}

impl Drop for IdleMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Session manager
pub struct SessionManager {
    api: Arc<dyn ExpenseApi>,
    store: Arc<dyn ClientStore>,
    policy: IdlePolicy,
    state: watch::Sender<SessionState>,
    monitor: Mutex<Option<IdleMonitor>>,
    event_log: Option<Arc<LoggingService>>,
    this: Weak<SessionManager>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("policy", &self.policy)
            .field("status", &self.state.borrow().status())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(
        api: Arc<dyn ExpenseApi>,
        store: Arc<dyn ClientStore>,
        policy: IdlePolicy,
        event_log: Option<Arc<LoggingService>>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::unresolved());
        Arc::new_cyclic(|this| Self {
            api,
            store,
            policy,
            state,
            monitor: Mutex::new(None),
            event_log,
            this: this.clone(),
        })
    }

    pub fn policy(&self) -> IdlePolicy {
        self.policy
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn current_token(&self) -> Option<String> {
        self.state.borrow().token().map(str::to_string)
    }

    /// False while a token is being validated
    pub fn is_ready(&self) -> bool {
        self.state.borrow().status() != SessionStatus::Loading
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor_slot().is_some()
    }

    /// Establish a session from a bearer token.
    ///
    /// The token is persisted first so the profile fetch is authenticated.
    /// If the fetch fails the session is torn down and the error returned.
    pub async fn login(&self, token: &str) -> Result<User> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::validation("Token cannot be empty"));
        }

        self.store.set(TOKEN_KEY, token)?;
        self.stamp_activity();
        self.state.send_replace(SessionState::validating(token));

        let user = match self.api.me().await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "profile fetch failed during login");
                self.record(LogEvent::new(events::AUTH_FAILURE).with_endpoint("/auth/me"));
                self.logout();
                return Err(e);
            }
        };

        self.establish(token, user.clone())?;
        self.record(LogEvent::new(events::LOGIN));
        info!(user_id = user.id, "logged in");
        Ok(user)
    }

    /// Exchange email and password for a token, then log in
    pub async fn login_with_password(&self, email: &str, password: &str) -> Result<User> {
        let credentials = Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        if credentials.email.is_empty() || credentials.password.is_empty() {
            return Err(Error::validation("Email and password are required"));
        }

        let token = self
            .api
            .login(&credentials)
            .await
            .map_err(|e| self.credential_failure("/auth/login", e))?;
        self.login(&token.access_token).await
    }

    /// Validate the form locally, create the account, then log in
    pub async fn signup(&self, form: &SignupForm) -> Result<User> {
        form.validate()?;
        let token = self.api.signup(form).await?;
        self.login(&token.access_token).await
    }

    /// Exchange a Google ID token for a session
    pub async fn login_with_google(&self, id_token: &str) -> Result<User> {
        let id_token = id_token.trim();
        if id_token.is_empty() {
            return Err(Error::validation("Google ID token is required"));
        }
        let token = self
            .api
            .google_login(id_token)
            .await
            .map_err(|e| self.credential_failure("/auth/google", e))?;
        self.login(&token.access_token).await
    }

    /// End the session. Safe to call at any time, any number of times.
    pub fn logout(&self) {
        self.end_session(events::LOGOUT);
    }

    /// Resolve the session persisted by a previous run.
    pub async fn restore(&self) -> Result<SessionState> {
        let token = match self.store.get(TOKEN_KEY)? {
            Some(t) if !t.trim().is_empty() => t,
            _ => {
                self.state.send_replace(SessionState::logged_out());
                return Ok(self.state());
            }
        };

        match self.last_activity() {
            Some(last) if self.policy.is_expired(last, unix_ms()) => {
                info!("stored session idle past threshold");
                self.end_session(events::SESSION_TIMEOUT);
                return Ok(self.state());
            }
            Some(_) => {}
            None => self.stamp_activity(),
        }

        self.state.send_replace(SessionState::validating(token.clone()));

        match self.api.me().await {
            Ok(user) => {
                self.establish(&token, user)?;
                debug!("session restored");
                Ok(self.state())
            }
            Err(e) => {
                warn!(error = %e, "stored session could not be validated");
                if e.is_auth_failure() {
                    self.record(LogEvent::new(events::AUTH_FAILURE).with_endpoint("/auth/me"));
                }
                self.logout();
                Err(e)
            }
        }
    }

    /// Note a user interaction; ignored when no token is held
    pub fn record_activity(&self, event: InteractionEvent) {
        // Held across check and write so a concurrent end_session cannot
        // clear the stamp between them
        let _lifecycle = self.monitor_slot();
        if self.state.borrow().token().is_none() {
            return;
        }
        debug!(event = event.as_str(), "activity");
        self.stamp_activity();
    }

    /// Run one idle check now
    pub fn check_idle(&self) -> bool {
        self.check_idle_at(unix_ms())
    }

    /// Run one idle check against `now_ms`; returns true if the session was ended
    pub fn check_idle_at(&self, now_ms: i64) -> bool {
        if !self.policy.enabled || self.state.borrow().token().is_none() {
            return false;
        }
        match self.last_activity() {
            Some(last) if self.policy.is_expired(last, now_ms) => {
                info!(
                    idle_ms = now_ms.saturating_sub(last),
                    "session idle past threshold, logging out"
                );
                self.end_session(events::SESSION_TIMEOUT);
                true
            }
            _ => false,
        }
    }

    /// Pass a result through, ending the session on an authorization failure
    pub fn guard<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_auth_failure() {
                warn!(error = %e, "request rejected as unauthorized, ending session");
                self.record(LogEvent::new(events::AUTH_FAILURE).with_error(e.to_string()));
                self.logout();
            }
        }
        result
    }

    /// Rejected credentials are not a session ending; surface the server's reason
    fn credential_failure(&self, endpoint: &str, error: Error) -> Error {
        match error {
            Error::Unauthorized { detail } => {
                self.record(
                    LogEvent::new(events::AUTH_FAILURE)
                        .with_endpoint(endpoint)
                        .with_status(401),
                );
                Error::Api {
                    status: 401,
                    detail: Some(detail.unwrap_or_else(|| "Invalid credentials".to_string())),
                }
            }
            other => other,
        }
    }

    fn establish(&self, token: &str, user: User) -> Result<()> {
        // A logout (or another login) may have landed while the profile was in flight
        if self.state.borrow().token() != Some(token) {
            return Err(Error::Unauthorized {
                detail: Some("Session ended before login completed".to_string()),
            });
        }
        self.state
            .send_replace(SessionState::authenticated(token, user));
        self.start_monitor();
        Ok(())
    }

    fn end_session(&self, event: &str) {
        let mut lifecycle = self.monitor_slot();
        // Dropping the handle cancels the idle task
        drop(lifecycle.take());

        let stored = matches!(self.store.get(TOKEN_KEY), Ok(Some(_)));

        for key in [TOKEN_KEY, LAST_ACTIVITY_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "failed to clear client store key");
            }
        }

        let previous = self.state.send_replace(SessionState::logged_out());
        drop(lifecycle);
        if previous.token().is_some() || stored {
            info!(reason = event, "session ended");
            self.record(LogEvent::new(event));
        }
    }

    fn start_monitor(&self) {
        if !self.policy.enabled {
            return;
        }

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let manager = self.this.clone();
        let period = self.policy.check_interval.max(MIN_CHECK_INTERVAL);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(manager) = manager.upgrade() else { break };
                        if manager.check_idle() {
                            break;
                        }
                    }
                }
            }
            debug!("idle monitor stopped");
        });

        *self.monitor_slot() = Some(IdleMonitor {
            cancel,
            _handle: handle,
        });
    }

    fn monitor_slot(&self) -> MutexGuard<'_, Option<IdleMonitor>> {
        self.monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn last_activity(&self) -> Option<i64> {
        match self.store.get(LAST_ACTIVITY_KEY) {
            Ok(value) => value.and_then(|v| v.trim().parse().ok()),
            Err(e) => {
                warn!(error = %e, "failed to read last activity");
                None
            }
        }
    }

    fn stamp_activity(&self) {
        if let Err(e) = self.store.set(LAST_ACTIVITY_KEY, &unix_ms().to_string()) {
            warn!(error = %e, "failed to persist activity stamp");
        }
    }

    fn record(&self, event: LogEvent) {
        if let Some(log) = &self.event_log {
            log.record(event);
        }
    }
}
