//! SQLite backend for the Courtbook record store.
//!
//! Wraps [`tokio_rusqlite`] so every database call runs on a dedicated
//! connection thread without blocking the async runtime. Tables are plain
//! `TEXT` columns addressed by name, rows by rowid; all typing lives above
//! the store boundary.

mod store;

pub use store::SqliteStore;
