//! salesdesk — "ask your business data" backend.
//!
//! A query is classified into an intent, answered from the caller's own
//! records in SQLite, and phrased by a generative model. The binary entry
//! point is `src/main.rs`; everything is exposed here for integration tests.

pub mod assistant;
pub mod bootstrap;
pub mod core;
pub mod llm;
pub mod server;
pub mod store;

pub use bootstrap::logger;
pub use crate::core::{config, error};
