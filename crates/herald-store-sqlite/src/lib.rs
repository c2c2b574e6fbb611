//! SQLite backend for the Herald subscriber directory and settings.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every operation is a single statement
//! or a single transaction on that thread, which keeps per-subscriber
//! updates linearizable.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
