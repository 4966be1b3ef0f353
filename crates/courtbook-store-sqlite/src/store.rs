//! [`SqliteStore`]: the tabular record store over a single SQLite file.

use std::path::Path;

use courtbook_core::store::{Record, RecordStore, RowHandle, StoreError};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// What a call observed: the table was there and the operation produced a
/// value, the table was absent, or the addressed data was unusable.
enum OpResult<T> {
  Done(T),
  NoTable,
  Fault(String),
}

impl<T> OpResult<T> {
  fn resolve(self, table: &str) -> Result<T, StoreError> {
    match self {
      OpResult::Done(value) => Ok(value),
      OpResult::NoTable => Err(StoreError::TableMissing(table.to_string())),
      OpResult::Fault(detail) => Err(StoreError::Backend(detail.into())),
    }
  }
}

fn db_err(err: tokio_rusqlite::Error) -> StoreError {
  StoreError::backend(err)
}

/// Quote an identifier for direct inclusion in SQL. Identifiers cannot be
/// bound as parameters.
fn quote_ident(name: &str) -> String {
  format!("\"{}\"", name.replace('"', "\"\""))
}

fn table_exists(
  conn: &rusqlite::Connection,
  table: &str,
) -> rusqlite::Result<bool> {
  let mut stmt = conn.prepare(
    "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
  )?;
  stmt.exists(rusqlite::params![table])
}

/// Column names of `table` in stored (cid) order.
fn columns_of(
  conn: &rusqlite::Connection,
  table: &str,
) -> rusqlite::Result<Vec<String>> {
  let mut stmt =
    conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
  stmt
    .query_map(rusqlite::params![table], |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A record store backed by one SQLite file.
///
/// Cloning is cheap; clones share the connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path`.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
    let conn = Connection::open(path).await.map_err(db_err)?;
    let store = Self { conn };
    store.init_pragmas().await?;
    Ok(store)
  }

  /// Open an ephemeral in-memory store. Useful for testing.
  pub async fn open_in_memory() -> Result<Self, StoreError> {
    let conn = Connection::open_in_memory().await.map_err(db_err)?;
    let store = Self { conn };
    store.init_pragmas().await?;
    Ok(store)
  }

  async fn init_pragmas(&self) -> Result<(), StoreError> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Ok(())
      })
      .await
      .map_err(db_err)
  }
}

impl RecordStore for SqliteStore {
  async fn read_all(&self, table: &str) -> Result<Vec<Record>, StoreError> {
    let table_name = table.to_string();
    let rows = self
      .conn
      .call(move |conn| {
        if !table_exists(conn, &table_name)? {
          return Ok(OpResult::NoTable);
        }
        let sql = format!(
          "SELECT rowid, * FROM {} ORDER BY rowid",
          quote_ident(&table_name)
        );
        let mut stmt = conn.prepare(&sql)?;
        let names: Vec<String> = stmt
          .column_names()
          .into_iter()
          .skip(1) // rowid
          .map(str::to_string)
          .collect();
        let rows = stmt
          .query_map([], |row| {
            let rowid: i64 = row.get(0)?;
            let mut columns = Vec::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
              let value: Option<String> = row.get(i + 1)?;
              columns.push((name.clone(), value.unwrap_or_default()));
            }
            Ok((rowid, columns))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(OpResult::Done(rows))
      })
      .await
      .map_err(db_err)?
      .resolve(table)?;

    Ok(
      rows
        .into_iter()
        .map(|(rowid, columns)| {
          Record::new(RowHandle::new(table, rowid), columns)
        })
        .collect(),
    )
  }

  async fn append_row(
    &self,
    table: &str,
    row: Vec<String>,
  ) -> Result<(), StoreError> {
    let table_name = table.to_string();
    self
      .conn
      .call(move |conn| {
        if !table_exists(conn, &table_name)? {
          return Ok(OpResult::NoTable);
        }
        let width = columns_of(conn, &table_name)?.len();
        if row.len() != width {
          return Ok(OpResult::Fault(format!(
            "table {table_name} has {width} columns but the row has {} cells",
            row.len()
          )));
        }
        let placeholders = (1..=row.len())
          .map(|i| format!("?{i}"))
          .collect::<Vec<_>>()
          .join(", ");
        let sql = format!(
          "INSERT INTO {} VALUES ({placeholders})",
          quote_ident(&table_name)
        );
        conn.execute(&sql, rusqlite::params_from_iter(row.iter()))?;
        Ok(OpResult::Done(()))
      })
      .await
      .map_err(db_err)?
      .resolve(table)
  }

  async fn find_row(
    &self,
    table: &str,
    key: &str,
  ) -> Result<Option<RowHandle>, StoreError> {
    let table_name = table.to_string();
    let key = key.to_string();
    let rowid = self
      .conn
      .call(move |conn| {
        if !table_exists(conn, &table_name)? {
          return Ok(OpResult::NoTable);
        }
        let columns = columns_of(conn, &table_name)?;
        let Some(key_column) = columns.first() else {
          return Ok(OpResult::Fault(format!(
            "table {table_name} has no columns"
          )));
        };
        let sql = format!(
          "SELECT rowid FROM {} WHERE {} = ?1 ORDER BY rowid LIMIT 1",
          quote_ident(&table_name),
          quote_ident(key_column)
        );
        let rowid: Option<i64> = conn
          .query_row(&sql, rusqlite::params![key], |row| row.get(0))
          .optional()?;
        Ok(OpResult::Done(rowid))
      })
      .await
      .map_err(db_err)?
      .resolve(table)?;

    Ok(rowid.map(|rowid| RowHandle::new(table, rowid)))
  }

  async fn read_cell(
    &self,
    handle: &RowHandle,
    column: usize,
  ) -> Result<String, StoreError> {
    let table = handle.table.clone();
    let handle = handle.clone();
    self
      .conn
      .call(move |conn| {
        if !table_exists(conn, &handle.table)? {
          return Ok(OpResult::NoTable);
        }
        let columns = columns_of(conn, &handle.table)?;
        let Some(name) =
          column.checked_sub(1).and_then(|i| columns.get(i))
        else {
          return Ok(OpResult::Fault(format!(
            "column {column} out of range for {}",
            handle.table
          )));
        };
        let sql = format!(
          "SELECT {} FROM {} WHERE rowid = ?1",
          quote_ident(name),
          quote_ident(&handle.table)
        );
        let value: Option<Option<String>> = conn
          .query_row(&sql, rusqlite::params![handle.row], |row| row.get(0))
          .optional()?;
        match value {
          Some(cell) => Ok(OpResult::Done(cell.unwrap_or_default())),
          None => Ok(OpResult::Fault(format!(
            "row {} not in {}",
            handle.row, handle.table
          ))),
        }
      })
      .await
      .map_err(db_err)?
      .resolve(&table)
  }

  async fn update_cell(
    &self,
    handle: &RowHandle,
    column: usize,
    value: String,
  ) -> Result<(), StoreError> {
    let table = handle.table.clone();
    let handle = handle.clone();
    self
      .conn
      .call(move |conn| {
        if !table_exists(conn, &handle.table)? {
          return Ok(OpResult::NoTable);
        }
        let columns = columns_of(conn, &handle.table)?;
        let Some(name) =
          column.checked_sub(1).and_then(|i| columns.get(i))
        else {
          return Ok(OpResult::Fault(format!(
            "column {column} out of range for {}",
            handle.table
          )));
        };
        let sql = format!(
          "UPDATE {} SET {} = ?1 WHERE rowid = ?2",
          quote_ident(&handle.table),
          quote_ident(name)
        );
        let changed =
          conn.execute(&sql, rusqlite::params![value, handle.row])?;
        if changed == 0 {
          return Ok(OpResult::Fault(format!(
            "row {} not in {}",
            handle.row, handle.table
          )));
        }
        Ok(OpResult::Done(()))
      })
      .await
      .map_err(db_err)?
      .resolve(&table)
  }

  async fn delete_row(&self, handle: &RowHandle) -> Result<(), StoreError> {
    let table = handle.table.clone();
    let handle = handle.clone();
    self
      .conn
      .call(move |conn| {
        if !table_exists(conn, &handle.table)? {
          return Ok(OpResult::NoTable);
        }
        let sql =
          format!("DELETE FROM {} WHERE rowid = ?1", quote_ident(&handle.table));
        let changed = conn.execute(&sql, rusqlite::params![handle.row])?;
        if changed == 0 {
          return Ok(OpResult::Fault(format!(
            "row {} not in {}",
            handle.row, handle.table
          )));
        }
        Ok(OpResult::Done(()))
      })
      .await
      .map_err(db_err)?
      .resolve(&table)
  }

  async fn create_table(
    &self,
    table: &str,
    columns: &[&str],
  ) -> Result<(), StoreError> {
    let table_name = table.to_string();
    let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    self
      .conn
      .call(move |conn| {
        let body = columns
          .iter()
          .map(|c| format!("{} TEXT NOT NULL DEFAULT ''", quote_ident(c)))
          .collect::<Vec<_>>()
          .join(", ");
        let sql = format!(
          "CREATE TABLE IF NOT EXISTS {} ({body})",
          quote_ident(&table_name)
        );
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await
      .map_err(db_err)
  }
}
