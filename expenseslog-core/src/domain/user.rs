//! User and authentication models

use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Minimum password length accepted at signup
pub const MIN_PASSWORD_LEN: usize = 6;

/// Represents an authenticated user, as returned by `GET /auth/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl User {
    pub fn new(id: i64, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Token issued by the auth endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Email/password credentials for `POST /auth/login`
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Signup form, validated locally before anything is sent
#[derive(Debug, Clone, Serialize)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip)]
    pub confirm_password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("Name is required"));
        }
        if self.email.trim().is_empty() {
            return Err(Error::validation("Email is required"));
        }
        if self.password != self.confirm_password {
            return Err(Error::validation("Passwords do not match"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(password: &str, confirm: &str) -> SignupForm {
        SignupForm {
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[test]
    fn test_user_deserialization_ignores_extra_fields() {
        let user: User = serde_json::from_str(
            r#"{"id": 7, "name": "Asha", "email": "asha@example.com", "created_at": "2024-01-01T00:00:00"}"#,
        )
        .unwrap();
        assert_eq!(user, User::new(7, "Asha", "asha@example.com"));
    }

    #[test]
    fn test_signup_password_mismatch() {
        let err = form("secret1", "secret2").validate().unwrap_err();
        assert!(err.to_string().contains("do not match"));
    }

    #[test]
    fn test_signup_password_too_short() {
        let err = form("abc", "abc").validate().unwrap_err();
        assert!(err.to_string().contains("at least 6"));
        assert!(form("abcdef", "abcdef").validate().is_ok());
    }

    #[test]
    fn test_signup_confirmation_not_serialized() {
        let json = serde_json::to_value(form("abcdef", "abcdef")).unwrap();
        assert!(json.get("confirm_password").is_none());
        assert_eq!(json["password"], "abcdef");
    }

    #[test]
    fn test_access_token_default_type() {
        let token: AccessToken = serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(token.token_type, "bearer");
    }
}
