//! Attendance ledger, read-only over HTTP. Entries are only ever written
//! by reconciliation passes.

use axum::{
  Json,
  extract::{Query, State},
};
use courtbook_core::{ledger::LedgerEntry, ops, store::RecordStore};
use serde::Deserialize;

use crate::{AppState, auth::AdminSession, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct LedgerParams {
  /// Restrict to one member's attendance history.
  pub member_id: Option<i64>,
}

/// `GET /ledger`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  _session: AdminSession,
  Query(params): Query<LedgerParams>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError>
where
  S: RecordStore + Clone + Send + Sync + 'static,
{
  let mut entries = ops::load_ledger(state.store.as_ref()).await?;
  if let Some(id) = params.member_id {
    entries.retain(|entry| entry.member_id.0 == id);
  }
  Ok(Json(entries))
}
