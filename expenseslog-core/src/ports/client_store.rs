//! Persistent client store port
//!
//! Durable key/value storage for the little state the client keeps between
//! runs: the auth token and the last-activity stamp.

use crate::domain::result::Result;

/// Key holding the bearer token
pub const TOKEN_KEY: &str = "token";

/// Key holding the last user activity as unix milliseconds
pub const LAST_ACTIVITY_KEY: &str = "lastActivity";

/// Client key/value store trait
pub trait ClientStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}
