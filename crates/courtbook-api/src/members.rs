//! Member handlers.
//!
//! | Method | Path                    | Handler     |
//! |--------|-------------------------|-------------|
//! | GET    | `/members`              | [`list`]    |
//! | POST   | `/members`              | [`create`]  |
//! | GET    | `/members/{id}`         | [`get_one`] |
//! | PUT    | `/members/{id}`         | [`update`]  |
//! | DELETE | `/members/{id}`         | [`delete`]  |
//! | POST   | `/members/{id}/adjust`  | [`adjust`]  |
//! | POST   | `/members/{id}/renew`   | [`renew`]   |
//!
//! Read endpoints take an optional `as_of` date query parameter; derived
//! fields (activity, age, category) are computed against it. It defaults
//! to today, and exists mostly so operators and tests can pin the clock.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use courtbook_core::{
  member::{MemberId, MemberUpdate, MemberView, NewMember},
  ops::{self, Mutation, Renewal},
  reconcile,
  store::RecordStore,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{AppState, auth::AdminSession, error::ApiError, today_utc};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct AsOfParams {
  pub as_of: Option<NaiveDate>,
}

/// `GET /members`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  _session: AdminSession,
  Query(params): Query<AsOfParams>,
) -> Result<Json<Vec<MemberView>>, ApiError>
where
  S: RecordStore + Clone + Send + Sync + 'static,
{
  let today = params.as_of.unwrap_or_else(today_utc);
  let table =
    ops::load_members(state.store.as_ref(), state.day_names).await?;
  let views = table
    .members
    .into_iter()
    .map(|row| MemberView::derive(row.member, today))
    .collect();
  Ok(Json(views))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /members`
///
/// Creates the member, then runs a best-effort reconciliation pass so a
/// backdated enrollment start is debited immediately. A failed pass is
/// logged and swallowed; the enrolment itself stands.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  session: AdminSession,
  Json(body): Json<NewMember>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecordStore + Clone + Send + Sync + 'static,
{
  if body.name.trim().is_empty() {
    return Err(ApiError::BadRequest("name must not be blank".to_string()));
  }

  let today = today_utc();
  let member =
    ops::create_member(state.store.as_ref(), body, state.day_names).await?;
  info!(member = %member.id, admin = %session.username, "member enrolled");

  if let Err(err) =
    reconcile::run(state.store.as_ref(), today, state.day_names).await
  {
    warn!(error = %err, "post-enrolment reconciliation failed");
  }

  Ok((StatusCode::CREATED, Json(MemberView::derive(member, today))))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /members/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  _session: AdminSession,
  Path(id): Path<i64>,
  Query(params): Query<AsOfParams>,
) -> Result<Json<MemberView>, ApiError>
where
  S: RecordStore + Clone + Send + Sync + 'static,
{
  let today = params.as_of.unwrap_or_else(today_utc);
  let member =
    ops::get_member(state.store.as_ref(), MemberId(id), state.day_names)
      .await?
      .ok_or_else(|| ApiError::NotFound(format!("member {id} not found")))?;
  Ok(Json(MemberView::derive(member, today)))
}

// ─── Update and delete ────────────────────────────────────────────────────────

/// `PUT /members/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  _session: AdminSession,
  Path(id): Path<i64>,
  Json(body): Json<MemberUpdate>,
) -> Result<StatusCode, ApiError>
where
  S: RecordStore + Clone + Send + Sync + 'static,
{
  match ops::update_member(state.store.as_ref(), MemberId(id), body).await? {
    Mutation::Applied(()) => Ok(StatusCode::NO_CONTENT),
    Mutation::NotFound => {
      Err(ApiError::NotFound(format!("member {id} not found")))
    }
  }
}

/// `DELETE /members/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  session: AdminSession,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: RecordStore + Clone + Send + Sync + 'static,
{
  match ops::delete_member(state.store.as_ref(), MemberId(id)).await? {
    Mutation::Applied(()) => {
      info!(member = id, admin = %session.username, "member deleted");
      Ok(StatusCode::NO_CONTENT)
    }
    Mutation::NotFound => {
      Err(ApiError::NotFound(format!("member {id} not found")))
    }
  }
}

// ─── Credits ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AdjustBody {
  pub delta: i64,
}

#[derive(Debug, serde::Serialize)]
pub struct AdjustResponse {
  pub remaining_credits: i64,
}

/// `POST /members/{id}/adjust` — body `{"delta": -2}`
pub async fn adjust<S>(
  State(state): State<AppState<S>>,
  _session: AdminSession,
  Path(id): Path<i64>,
  Json(body): Json<AdjustBody>,
) -> Result<Json<AdjustResponse>, ApiError>
where
  S: RecordStore + Clone + Send + Sync + 'static,
{
  match ops::adjust_credits(state.store.as_ref(), MemberId(id), body.delta)
    .await?
  {
    Mutation::Applied(remaining_credits) => {
      Ok(Json(AdjustResponse { remaining_credits }))
    }
    Mutation::NotFound => {
      Err(ApiError::NotFound(format!("member {id} not found")))
    }
  }
}

// ─── Renewal ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct RenewBody {
  /// Credits to add. Defaults to the member's package quantum.
  pub credits: Option<i64>,
  /// New end date. Defaults to 30 days from `as_of`.
  pub until:   Option<NaiveDate>,
  /// Renewal date; today unless pinned.
  pub as_of:   Option<NaiveDate>,
}

/// `POST /members/{id}/renew`
pub async fn renew<S>(
  State(state): State<AppState<S>>,
  session: AdminSession,
  Path(id): Path<i64>,
  Json(body): Json<RenewBody>,
) -> Result<Json<Renewal>, ApiError>
where
  S: RecordStore + Clone + Send + Sync + 'static,
{
  let today = body.as_of.unwrap_or_else(today_utc);
  let grant = match body.credits {
    Some(credits) if credits <= 0 => {
      return Err(ApiError::BadRequest(
        "credits must be positive".to_string(),
      ));
    }
    Some(credits) => credits,
    // The default grant depends on the member's lesson type.
    None => {
      ops::get_member(state.store.as_ref(), MemberId(id), state.day_names)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("member {id} not found")))?
        .lesson_type
        .renewal_grant()
    }
  };

  match ops::renew_membership(
    state.store.as_ref(),
    MemberId(id),
    grant,
    body.until,
    today,
  )
  .await?
  {
    Mutation::Applied(renewal) => {
      info!(
        member = id,
        admin = %session.username,
        grant,
        "membership renewed"
      );
      Ok(Json(renewal))
    }
    Mutation::NotFound => {
      Err(ApiError::NotFound(format!("member {id} not found")))
    }
  }
}
