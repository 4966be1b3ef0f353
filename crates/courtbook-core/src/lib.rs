//! Core domain for Courtbook, a club membership registry with an
//! attendance-reconciliation ledger.
//!
//! Membership records, the append-only attendance ledger, scheduled-date
//! enumeration, and the batch engine that converts elapsed lesson days into
//! ledger entries and credit decrements, idempotently.
//!
//! The crate is free of HTTP and database code. Storage is reached only
//! through [`store::RecordStore`]; [`memory::MemStore`] is the reference
//! backend.

// We intentionally use native `async fn` in trait impls (stabilised in
// Rust 1.75). Suppress the advisory lint about `Send` bounds on the
// returned futures.
#![allow(async_fn_in_trait)]

pub mod admin;
pub mod calendar;
pub mod codec;
pub mod error;
pub mod ledger;
pub mod member;
pub mod memory;
pub mod ops;
pub mod reconcile;
pub mod schedule;
pub mod store;

pub use error::{Error, Result};
