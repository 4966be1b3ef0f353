//! Front-desk alert feed: memberships about to lapse and memberships
//! that just did.

use axum::{
  Json,
  extract::{Query, State},
};
use courtbook_core::{
  member::{self, MemberView},
  ops,
  store::RecordStore,
};
use serde::Serialize;

use crate::{
  AppState, auth::AdminSession, error::ApiError, members::AsOfParams,
  today_utc,
};

#[derive(Debug, Serialize)]
pub struct Alerts {
  /// Active members whose end date or credit balance is about to run out.
  pub expiring: Vec<MemberView>,
  /// Members whose membership lapsed within the last week.
  pub ended:    Vec<MemberView>,
}

/// `GET /alerts`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  _session: AdminSession,
  Query(params): Query<AsOfParams>,
) -> Result<Json<Alerts>, ApiError>
where
  S: RecordStore + Clone + Send + Sync + 'static,
{
  let today = params.as_of.unwrap_or_else(today_utc);
  let table =
    ops::load_members(state.store.as_ref(), state.day_names).await?;
  let members: Vec<_> =
    table.members.into_iter().map(|row| row.member).collect();

  let view = |member| MemberView::derive(member, today);
  let expiring = member::expiring_soon(&members, today)
    .into_iter()
    .map(view)
    .collect();
  let ended = member::recently_ended(&members, today)
    .into_iter()
    .map(view)
    .collect();

  Ok(Json(Alerts { expiring, ended }))
}
