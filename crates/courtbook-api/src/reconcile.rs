//! Reconciliation trigger.

use axum::{Json, extract::State};
use chrono::NaiveDate;
use courtbook_core::{
  reconcile::{self, ReconcileReport},
  store::RecordStore,
};
use serde::Deserialize;
use tracing::info;

use crate::{AppState, auth::AdminSession, error::ApiError, today_utc};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReconcileBody {
  /// Treat this date as today. Occurrences after it are not scanned.
  pub as_of: Option<NaiveDate>,
}

/// `POST /reconcile`
///
/// Walks every member, debits unrecorded lesson occurrences up to `as_of`
/// and returns the full per-member report, skips included.
pub async fn run<S>(
  State(state): State<AppState<S>>,
  session: AdminSession,
  Json(body): Json<ReconcileBody>,
) -> Result<Json<ReconcileReport>, ApiError>
where
  S: RecordStore + Clone + Send + Sync + 'static,
{
  let today = body.as_of.unwrap_or_else(today_utc);
  info!(admin = %session.username, %today, "reconciliation requested");
  let report =
    reconcile::run(state.store.as_ref(), today, state.day_names).await?;
  Ok(Json(report))
}
