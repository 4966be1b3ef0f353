//! The [`RecordStore`] trait: the tabular persistence boundary.
//!
//! Backends present named tables of string cells, addressed by row handle
//! and 1-indexed column. All typing happens above this boundary, in the row
//! codec; a backend never interprets cell contents.

use std::future::Future;

use thiserror::Error;

// ─── Rows ────────────────────────────────────────────────────────────────────

/// Backend-assigned address of one row in one table.
///
/// Handles stay valid across cell updates and across deletes of *other*
/// rows. A deleted row's handle is never reused within the life of the
/// process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowHandle {
  /// Table the row lives in.
  pub table: String,
  /// Row address within the table (SQLite rowid, in-memory row key).
  pub row:   i64,
}

impl RowHandle {
  pub fn new(table: impl Into<String>, row: i64) -> RowHandle {
    RowHandle { table: table.into(), row }
  }
}

/// One row as read: its handle plus the cells, keyed by column name.
#[derive(Debug, Clone)]
pub struct Record {
  pub handle: RowHandle,
  columns:    Vec<(String, String)>,
}

impl Record {
  pub fn new(handle: RowHandle, columns: Vec<(String, String)>) -> Record {
    Record { handle, columns }
  }

  /// The cell under `column`, or `""` when the column is absent.
  pub fn cell(&self, column: &str) -> &str {
    self
      .columns
      .iter()
      .find(|(name, _)| name == column)
      .map(|(_, value)| value.as_str())
      .unwrap_or("")
  }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Failure modes shared by every [`RecordStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
  /// The named table does not exist. Recoverable for the ledger table,
  /// which is created on first use; fatal everywhere else.
  #[error("table not found: {0}")]
  TableMissing(String),

  /// The backend itself failed: connection, IO, stale handle, bad column.
  #[error("store backend error: {0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
  /// Wrap a backend-specific error.
  pub fn backend<E>(err: E) -> StoreError
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    StoreError::Backend(Box::new(err))
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

// We intentionally use native `async fn`-style futures in this trait
// (stabilised in Rust 1.75) rather than boxing. The explicit `impl Future`
// form keeps the `Send` bound on the returned futures visible.

/// Abstraction over the club's tabular record store.
///
/// Reads return whole tables in stored order. Mutations address single rows
/// by handle. `find_row` matches on the *first* column only; by convention
/// that is the key column (member id, admin username) in every table this
/// system keeps.
///
/// `append_row` takes a full-width row: a value for every column, in stored
/// column order. Backends reject rows of any other width.
pub trait RecordStore: Send + Sync {
  /// Every row of `table`, in stored order.
  fn read_all<'a>(
    &'a self,
    table: &'a str,
  ) -> impl Future<Output = Result<Vec<Record>, StoreError>> + Send + 'a;

  /// Append one full row of positional cell values.
  fn append_row<'a>(
    &'a self,
    table: &'a str,
    row: Vec<String>,
  ) -> impl Future<Output = Result<(), StoreError>> + Send + 'a;

  /// The first row whose first-column cell equals `key`, oldest first.
  fn find_row<'a>(
    &'a self,
    table: &'a str,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<RowHandle>, StoreError>> + Send + 'a;

  /// Read a single cell. `column` is 1-indexed in stored column order.
  fn read_cell<'a>(
    &'a self,
    handle: &'a RowHandle,
    column: usize,
  ) -> impl Future<Output = Result<String, StoreError>> + Send + 'a;

  /// Overwrite a single cell. `column` is 1-indexed in stored column order.
  fn update_cell<'a>(
    &'a self,
    handle: &'a RowHandle,
    column: usize,
    value: String,
  ) -> impl Future<Output = Result<(), StoreError>> + Send + 'a;

  /// Remove one row. The handles of all other rows stay valid.
  fn delete_row<'a>(
    &'a self,
    handle: &'a RowHandle,
  ) -> impl Future<Output = Result<(), StoreError>> + Send + 'a;

  /// Create `table` with the given columns and zero rows. Creating a table
  /// that already exists leaves it untouched.
  fn create_table<'a>(
    &'a self,
    table: &'a str,
    columns: &'a [&'a str],
  ) -> impl Future<Output = Result<(), StoreError>> + Send + 'a;
}
