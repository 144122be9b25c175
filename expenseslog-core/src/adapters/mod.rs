//! Adapter implementations
//!
//! Concrete implementations of the port traits.

pub mod http;
pub mod store;

#[cfg(test)]
pub mod mock_backend;

pub use http::HttpGateway;
pub use store::{JsonFileStore, MemoryStore};
