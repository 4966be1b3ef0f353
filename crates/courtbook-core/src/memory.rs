//! In-memory [`RecordStore`] backed by plain maps.
//!
//! The reference backend, used by tests and embedders. Behaviour matches
//! the SQLite store: stored order is insertion order, handles survive
//! unrelated deletes, rows are full-width, cells are strings.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, MutexGuard},
};

use crate::store::{Record, RecordStore, RowHandle, StoreError};

#[derive(Debug, Default)]
struct Table {
  columns: Vec<String>,
  /// `(row key, cells)` in insertion order.
  rows:    Vec<(i64, Vec<String>)>,
  next_id: i64,
}

/// In-memory record store. Cloning shares the underlying tables.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
  tables: Arc<Mutex<HashMap<String, Table>>>,
}

impl MemStore {
  pub fn new() -> MemStore {
    MemStore::default()
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, Table>> {
    // Rows are replaced whole, so a poisoned lock still holds usable data.
    self.tables.lock().unwrap_or_else(|err| err.into_inner())
  }

  fn fault(detail: String) -> StoreError {
    StoreError::Backend(detail.into())
  }
}

impl RecordStore for MemStore {
  async fn read_all(&self, table: &str) -> Result<Vec<Record>, StoreError> {
    let tables = self.lock();
    let t = tables
      .get(table)
      .ok_or_else(|| StoreError::TableMissing(table.to_string()))?;
    Ok(
      t.rows
        .iter()
        .map(|(row, cells)| {
          let columns = t
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
              (name.clone(), cells.get(i).cloned().unwrap_or_default())
            })
            .collect();
          Record::new(RowHandle::new(table, *row), columns)
        })
        .collect(),
    )
  }

  async fn append_row(
    &self,
    table: &str,
    row: Vec<String>,
  ) -> Result<(), StoreError> {
    let mut tables = self.lock();
    let t = tables
      .get_mut(table)
      .ok_or_else(|| StoreError::TableMissing(table.to_string()))?;
    if row.len() != t.columns.len() {
      return Err(Self::fault(format!(
        "table {table} has {} columns but the row has {} cells",
        t.columns.len(),
        row.len()
      )));
    }
    let id = t.next_id;
    t.next_id += 1;
    t.rows.push((id, row));
    Ok(())
  }

  async fn find_row(
    &self,
    table: &str,
    key: &str,
  ) -> Result<Option<RowHandle>, StoreError> {
    let tables = self.lock();
    let t = tables
      .get(table)
      .ok_or_else(|| StoreError::TableMissing(table.to_string()))?;
    Ok(
      t.rows
        .iter()
        .find(|(_, cells)| cells.first().map(String::as_str) == Some(key))
        .map(|(row, _)| RowHandle::new(table, *row)),
    )
  }

  async fn read_cell(
    &self,
    handle: &RowHandle,
    column: usize,
  ) -> Result<String, StoreError> {
    let tables = self.lock();
    let t = tables
      .get(&handle.table)
      .ok_or_else(|| StoreError::TableMissing(handle.table.clone()))?;
    let index = column
      .checked_sub(1)
      .filter(|i| *i < t.columns.len())
      .ok_or_else(|| {
        Self::fault(format!(
          "column {column} out of range for {}",
          handle.table
        ))
      })?;
    let (_, cells) = t
      .rows
      .iter()
      .find(|(row, _)| *row == handle.row)
      .ok_or_else(|| {
        Self::fault(format!("row {} not in {}", handle.row, handle.table))
      })?;
    Ok(cells.get(index).cloned().unwrap_or_default())
  }

  async fn update_cell(
    &self,
    handle: &RowHandle,
    column: usize,
    value: String,
  ) -> Result<(), StoreError> {
    let mut tables = self.lock();
    let t = tables
      .get_mut(&handle.table)
      .ok_or_else(|| StoreError::TableMissing(handle.table.clone()))?;
    let index = column
      .checked_sub(1)
      .filter(|i| *i < t.columns.len())
      .ok_or_else(|| {
        Self::fault(format!(
          "column {column} out of range for {}",
          handle.table
        ))
      })?;
    let (_, cells) = t
      .rows
      .iter_mut()
      .find(|(row, _)| *row == handle.row)
      .ok_or_else(|| {
        Self::fault(format!("row {} not in {}", handle.row, handle.table))
      })?;
    cells[index] = value;
    Ok(())
  }

  async fn delete_row(&self, handle: &RowHandle) -> Result<(), StoreError> {
    let mut tables = self.lock();
    let t = tables
      .get_mut(&handle.table)
      .ok_or_else(|| StoreError::TableMissing(handle.table.clone()))?;
    let before = t.rows.len();
    t.rows.retain(|(row, _)| *row != handle.row);
    if t.rows.len() == before {
      return Err(Self::fault(format!(
        "row {} not in {}",
        handle.row, handle.table
      )));
    }
    Ok(())
  }

  async fn create_table(
    &self,
    table: &str,
    columns: &[&str],
  ) -> Result<(), StoreError> {
    let mut tables = self.lock();
    tables.entry(table.to_string()).or_insert_with(|| Table {
      columns: columns.iter().map(|c| c.to_string()).collect(),
      rows:    Vec::new(),
      next_id: 1,
    });
    Ok(())
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
