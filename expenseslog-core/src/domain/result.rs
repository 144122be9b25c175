//! Result and error types for the core library

use thiserror::Error;

/// Core library error type
///
/// Backend failures are passed through as returned by the server: the
/// `detail` of an API error is the server's own message, untouched.
#[derive(Error, Debug)]
pub enum Error {
    /// Request rejected for missing or invalid credentials (HTTP 401/403)
    #[error("{}", unauthorized_display(.detail))]
    Unauthorized { detail: Option<String> },

    /// Any other non-success response from the backend
    #[error("{}", api_display(.status, .detail))]
    Api { status: u16, detail: Option<String> },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Reimbursement submitted with no selected debit expense
    #[error("No eligible items: select debit expenses (credits cannot be reimbursed)")]
    NoEligibleItems,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

fn unauthorized_display(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!("Not authorized: {}", d),
        None => "Not authorized".to_string(),
    }
}

fn api_display(status: &u16, detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!("API error (HTTP {}): {}", status, d),
        None => format!("API error (HTTP {})", status),
    }
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// True for failures that must end the session
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Message suitable for showing to the user.
    ///
    /// Server-provided detail is shown verbatim when present, otherwise a
    /// generic fallback for the failure class.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized { .. } => {
                "Your session has ended. Please log in again.".to_string()
            }
            Self::Api { detail: Some(d), .. } => d.clone(),
            Self::Api { status, detail: None } => format!("Request failed (HTTP {})", status),
            Self::Network(_) => "Unable to reach the server. Please try again.".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::NoEligibleItems => {
                "Please select debit expenses (credits cannot be reimbursed).".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_detail_passed_through() {
        let err = Error::Api {
            status: 400,
            detail: Some("No reimbursable expenses selected".to_string()),
        };
        assert_eq!(err.user_message(), "No reimbursable expenses selected");
        assert!(err.to_string().contains("HTTP 400"));
    }

    #[test]
    fn test_api_fallback_message() {
        let err = Error::Api { status: 502, detail: None };
        assert_eq!(err.user_message(), "Request failed (HTTP 502)");
    }

    #[test]
    fn test_auth_failure_classification() {
        assert!(Error::Unauthorized { detail: None }.is_auth_failure());
        assert!(!Error::Network("refused".into()).is_auth_failure());
        assert!(!Error::NoEligibleItems.is_auth_failure());
    }

    #[test]
    fn test_validation_message_is_shown_as_is() {
        let err = Error::validation("Passwords do not match");
        assert_eq!(err.user_message(), "Passwords do not match");
        assert!(err.to_string().contains("Validation error"));
    }
}
