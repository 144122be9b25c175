//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The services
//! depend only on these traits, not on concrete implementations.

mod client_store;
mod expense_api;

pub use client_store::{ClientStore, LAST_ACTIVITY_KEY, TOKEN_KEY};
pub use expense_api::ExpenseApi;
