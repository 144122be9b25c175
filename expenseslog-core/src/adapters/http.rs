//! ExpensesLog backend HTTP gateway
//!
//! Single HTTP client for the REST backend. Every request carries the bearer
//! token when the client store holds one, and every request/response/error
//! is logged through `tracing` (without credentials or file contents).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{multipart, Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{
    AccessToken, Credentials, Expense, FilterCriteria, ReimbursedItem, Reimbursement,
    ReimbursementRequest, SignupForm, Summary, UploadSummary, User,
};
use crate::ports::{ClientStore, ExpenseApi, TOKEN_KEY};

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// JSON keys never written to the log
const REDACTED_KEYS: &[&str] = &["password", "token", "access_token"];

/// What a request carries, for sending and for logging
enum Payload {
    Empty,
    Query(Vec<(&'static str, String)>),
    Json(JsonValue),
    File { name: String, bytes: Vec<u8> },
}

impl Payload {
    /// Loggable summary of the payload
    fn describe(&self) -> String {
        match self {
            Payload::Empty => String::new(),
            Payload::Query(pairs) => pairs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&"),
            Payload::Json(value) => redact(value).to_string(),
            Payload::File { name, bytes } => format!("file={} ({} bytes)", name, bytes.len()),
        }
    }
}

fn redact(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| {
                    if REDACTED_KEYS.contains(&k.as_str()) {
                        (k.clone(), JsonValue::String("***".to_string()))
                    } else {
                        (k.clone(), redact(v))
                    }
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Pull the server's `detail` out of an error body.
///
/// String details are returned verbatim; structured details are JSON-encoded.
pub fn extract_detail(body: &str) -> Option<String> {
    let value: JsonValue = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// HTTP implementation of [`ExpenseApi`]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    store: Arc<dyn ClientStore>,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    /// Create a gateway for `base_url` reading the token from `store`
    pub fn new(base_url: &str, store: Arc<dyn ClientStore>) -> anyhow::Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT, store)
    }

    pub fn with_timeout(
        base_url: &str,
        timeout: Duration,
        store: Arc<dyn ClientStore>,
    ) -> anyhow::Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            anyhow::bail!("API base URL cannot be empty");
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            store,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the bearer token if one is stored
    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        match self.store.get(TOKEN_KEY)? {
            Some(token) if !token.is_empty() => Ok(request.bearer_auth(token)),
            _ => Ok(request),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
    ) -> Result<T> {
        let url = self.url(path);
        debug!(method = %method, url = %url, payload = %payload.describe(), "api request");

        let request = self.client.request(method.clone(), &url);
        let request = match payload {
            Payload::Empty => request,
            Payload::Query(pairs) => request.query(&pairs),
            Payload::Json(body) => request.json(&body),
            Payload::File { name, bytes } => {
                let part = multipart::Part::bytes(bytes).file_name(name);
                request.multipart(multipart::Form::new().part("file", part))
            }
        };
        let request = self.authorize(request)?;

        let response = request.send().await.map_err(|e| {
            warn!(method = %method, url = %url, error = %e, "api error");
            map_request_error(e)
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(method = %method, url = %url, status = status.as_u16(), "api response");
            return response.json::<T>().await.map_err(|e| {
                Error::Other(format!("Failed to parse response from {}: {}", path, e))
            });
        }

        let body = response.text().await.unwrap_or_default();
        let detail = extract_detail(&body);
        warn!(
            method = %method,
            url = %url,
            status = status.as_u16(),
            detail = detail.as_deref().unwrap_or(""),
            "api error"
        );

        Err(match status.as_u16() {
            401 | 403 => Error::Unauthorized { detail },
            code => Error::Api { status: code, detail },
        })
    }
}

/// Map transport errors to user-facing network errors
fn map_request_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Network("Request timed out".to_string())
    } else if error.is_connect() {
        Error::Network("Unable to connect to the ExpensesLog server".to_string())
    } else {
        Error::Network(format!("Request failed: {}", error))
    }
}

#[async_trait]
impl ExpenseApi for HttpGateway {
    async fn signup(&self, form: &SignupForm) -> Result<AccessToken> {
        let body = serde_json::to_value(form)?;
        self.call(Method::POST, "/auth/signup", Payload::Json(body)).await
    }

    async fn login(&self, credentials: &Credentials) -> Result<AccessToken> {
        let body = serde_json::to_value(credentials)?;
        self.call(Method::POST, "/auth/login", Payload::Json(body)).await
    }

    async fn google_login(&self, id_token: &str) -> Result<AccessToken> {
        let body = serde_json::json!({ "token": id_token });
        self.call(Method::POST, "/auth/google", Payload::Json(body)).await
    }

    async fn me(&self) -> Result<User> {
        self.call(Method::GET, "/auth/me", Payload::Empty).await
    }

    async fn upload_statement(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadSummary> {
        let payload = Payload::File {
            name: file_name.to_string(),
            bytes,
        };
        self.call(Method::POST, "/statements/upload", payload).await
    }

    async fn list_expenses(&self, criteria: &FilterCriteria) -> Result<Vec<Expense>> {
        let payload = Payload::Query(criteria.to_query_pairs());
        self.call(Method::GET, "/expenses/", payload).await
    }

    async fn create_reimbursement(
        &self,
        expense_ids: &[i64],
        note: Option<&str>,
    ) -> Result<Reimbursement> {
        let body = serde_json::to_value(ReimbursementRequest {
            expense_ids: expense_ids.to_vec(),
            note: note.map(str::to_string),
        })?;
        self.call(Method::POST, "/reimbursements/", Payload::Json(body)).await
    }

    async fn list_reimbursements(&self) -> Result<Vec<Reimbursement>> {
        self.call(Method::GET, "/reimbursements/", Payload::Empty).await
    }

    async fn reimbursement_items(&self, reimbursement_id: i64) -> Result<Vec<ReimbursedItem>> {
        let path = format!("/reimbursements/{}/items", reimbursement_id);
        self.call(Method::GET, &path, Payload::Empty).await
    }

    async fn summary(&self) -> Result<Summary> {
        self.call(Method::GET, "/summary/", Payload::Empty).await
    }
}

// =============================================================================
// Tests
// =============================================================================
