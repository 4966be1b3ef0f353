//! Error types for `courtbook-core`.
//!
//! Store failures have their own type, [`StoreError`], defined next to the
//! [`RecordStore`] trait; this one covers decoding.
//!
//! [`StoreError`]: crate::store::StoreError
//! [`RecordStore`]: crate::store::RecordStore

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A stored row that cannot be decoded into its domain type. Loaders log
  /// and count these; they are never fatal to a whole pass.
  #[error("unreadable {table} row: {detail}")]
  UnreadableRow {
    table:  &'static str,
    detail: String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
