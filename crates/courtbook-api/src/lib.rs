//! JSON REST API for Courtbook.
//!
//! Exposes an axum [`Router`] backed by any
//! [`courtbook_core::store::RecordStore`]. Every route sits behind HTTP
//! Basic auth against the stored administrator table; TLS and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let state = AppState { store: Arc::new(store), day_names: DayNames::turkish() };
//! axum::serve(listener, courtbook_api::api_router(state)).await?;
//! ```

pub mod admins;
pub mod alerts;
pub mod auth;
pub mod error;
pub mod ledger;
pub mod members;
pub mod reconcile;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use chrono::{NaiveDate, Utc};
use courtbook_core::{calendar::DayNames, store::RecordStore};

pub use error::ApiError;

/// Shared state behind every handler.
#[derive(Debug, Clone)]
pub struct AppState<S> {
  pub store:     Arc<S>,
  /// Locale used when weekday cells are parsed or written.
  pub day_names: DayNames,
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router
/// regardless of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: RecordStore + Clone + Send + Sync + 'static,
{
  Router::new()
    // Members
    .route("/members", get(members::list::<S>).post(members::create::<S>))
    .route(
      "/members/{id}",
      get(members::get_one::<S>)
        .put(members::update::<S>)
        .delete(members::delete::<S>),
    )
    .route("/members/{id}/adjust", post(members::adjust::<S>))
    .route("/members/{id}/renew", post(members::renew::<S>))
    // Attendance
    .route("/ledger", get(ledger::list::<S>))
    .route("/reconcile", post(reconcile::run::<S>))
    .route("/alerts", get(alerts::list::<S>))
    // Admin accounts
    .route("/admins", post(admins::create::<S>))
    .route("/admins/{username}/password", put(admins::set_password::<S>))
    .with_state(state)
}

/// Today in UTC. Handlers use this wherever no `as_of` override is given.
pub(crate) fn today_utc() -> NaiveDate {
  Utc::now().date_naive()
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use chrono::NaiveDate;
  use courtbook_core::{
    admin::{self, Admin},
    calendar::{DayNames, Weekday, WeekdaySet},
    codec,
    member::{LessonType, Member, MemberId, PaymentMethod},
    memory::MemStore,
    store::RecordStore,
  };
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use crate::auth::hash_password;

  const ADMIN_USER: &str = "admin";
  const ADMIN_PASS: &str = "sifre";

  async fn make_state() -> AppState<MemStore> {
    let store = MemStore::default();
    store
      .create_table(codec::MEMBERS_TABLE, &codec::MEMBER_COLUMNS)
      .await
      .unwrap();
    store
      .create_table(codec::ADMINS_TABLE, &codec::ADMIN_COLUMNS)
      .await
      .unwrap();
    let account = Admin {
      username:      ADMIN_USER.to_string(),
      password_hash: hash_password(ADMIN_PASS).unwrap(),
    };
    admin::add_admin(&store, &account).await.unwrap();

    AppState { store: Arc::new(store), day_names: DayNames::turkish() }
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn send(
    state:  AppState<MemStore>,
    method: &str,
    uri:    &str,
    auth:   Option<&str>,
    body:   Option<Value>,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
      builder = builder.header(header::AUTHORIZATION, auth);
    }
    let req = match body {
      Some(value) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(value.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    api_router(state).oneshot(req).await.unwrap()
  }

  async fn body_json(resp: Response) -> Value {
    let bytes =
      axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  /// A fully-populated member row, appended straight into the store so
  /// tests can pin dates without tripping the post-enrolment catch-up.
  async fn seed_member(state: &AppState<MemStore>, member: &Member) {
    state
      .store
      .append_row(
        codec::MEMBERS_TABLE,
        codec::encode_member_row(member, state.day_names),
      )
      .await
      .unwrap();
  }

  fn member(id: i64, credits: i64) -> Member {
    Member {
      id:                 MemberId(id),
      name:               format!("üye {id}"),
      phone:              "0500 000 00 00".to_string(),
      gender:             String::new(),
      birth_date:         None,
      enrollment_start:   Some(date(2024, 1, 1)),
      enrollment_end:     Some(date(2024, 2, 1)),
      total_credits:      credits,
      remaining_credits:  credits,
      payment_method:     PaymentMethod::Cash,
      scheduled_weekdays: WeekdaySet::from(vec![
        Weekday::Monday,
        Weekday::Wednesday,
      ]),
      lesson_type:        LessonType::Group,
      guardian_name:      None,
      status:             "active".to_string(),
      category:           None,
    }
  }

  /// An enrolment body with no scheduled days and a far-future end date:
  /// never debited, active no matter what the wall clock says.
  fn quiet_enrolment(name: &str) -> Value {
    json!({
      "name": name,
      "phone": "0500 111 22 33",
      "enrollment_start": "2024-01-01",
      "enrollment_end": "2100-01-01",
      "initial_credits": 5,
      "payment_method": "cash",
      "lesson_type": "group",
    })
  }

  // ── Auth ────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn unauthenticated_requests_are_challenged() {
    let state = make_state().await;
    let resp  = send(state, "GET", "/members", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let challenge =
      resp.headers().get(header::WWW_AUTHENTICATE).unwrap().to_str().unwrap();
    assert!(challenge.starts_with("Basic"), "challenge: {challenge}");
  }

  #[tokio::test]
  async fn wrong_passwords_are_rejected() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, "yanlis");
    let resp  = send(state, "GET", "/members", Some(&auth), None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  // ── Members ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn enrolment_round_trips_through_the_list() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, ADMIN_PASS);

    let resp = send(
      state.clone(),
      "POST",
      "/members",
      Some(&auth),
      Some(quiet_enrolment("Ayşe Yılmaz")),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    assert_eq!(created["member"]["name"], "Ayşe Yılmaz");
    assert_eq!(created["active"], Value::Bool(true));
    assert_eq!(created["category"], "adult");

    let resp = send(state, "GET", "/members", Some(&auth), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let list = body_json(resp).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["member"]["name"], "Ayşe Yılmaz");
  }

  #[tokio::test]
  async fn blank_names_are_rejected() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, ADMIN_PASS);
    let mut body = quiet_enrolment("  ");
    body["name"] = json!("   ");
    let resp =
      send(state, "POST", "/members", Some(&auth), Some(body)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn fetching_an_unknown_member_is_404() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, ADMIN_PASS);
    let resp  = send(state, "GET", "/members/999", Some(&auth), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn updates_touch_only_the_given_cells() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, ADMIN_PASS);
    seed_member(&state, &member(42, 8)).await;

    let resp = send(
      state.clone(),
      "PUT",
      "/members/42",
      Some(&auth),
      Some(json!({ "phone": "0555 444 33 22" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp =
      send(state, "GET", "/members/42", Some(&auth), None).await;
    let view = body_json(resp).await;
    assert_eq!(view["member"]["phone"], "0555 444 33 22");
    assert_eq!(view["member"]["name"], "üye 42");
    assert_eq!(view["member"]["remaining_credits"], 8);
  }

  #[tokio::test]
  async fn deleted_members_vanish() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, ADMIN_PASS);
    seed_member(&state, &member(42, 8)).await;

    let resp =
      send(state.clone(), "DELETE", "/members/42", Some(&auth), None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp =
      send(state.clone(), "GET", "/members/42", Some(&auth), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp =
      send(state, "DELETE", "/members/42", Some(&auth), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn adjustments_floor_at_zero() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, ADMIN_PASS);
    seed_member(&state, &member(42, 3)).await;

    let resp = send(
      state.clone(),
      "POST",
      "/members/42/adjust",
      Some(&auth),
      Some(json!({ "delta": -10 })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["remaining_credits"], 0);

    let resp = send(
      state,
      "POST",
      "/members/42/adjust",
      Some(&auth),
      Some(json!({ "delta": 4 })),
    )
    .await;
    assert_eq!(body_json(resp).await["remaining_credits"], 4);
  }

  // ── Renewal ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn renewals_default_to_the_package_quantum() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, ADMIN_PASS);
    seed_member(&state, &member(42, 1)).await;

    let resp = send(
      state.clone(),
      "POST",
      "/members/42/renew",
      Some(&auth),
      Some(json!({ "as_of": "2024-03-01" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let renewal = body_json(resp).await;
    assert_eq!(renewal["enrollment_start"], "2024-03-01");
    assert_eq!(renewal["enrollment_end"], "2024-03-31");
    assert_eq!(renewal["total_credits"], 8);
    assert_eq!(renewal["remaining_credits"], 9);

    let resp =
      send(state, "GET", "/members/42?as_of=2024-03-01", Some(&auth), None)
        .await;
    let view = body_json(resp).await;
    assert_eq!(view["member"]["remaining_credits"], 9);
    assert_eq!(view["active"], Value::Bool(true));
  }

  #[tokio::test]
  async fn explicit_renewal_values_win() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, ADMIN_PASS);
    seed_member(&state, &member(42, 1)).await;

    let resp = send(
      state,
      "POST",
      "/members/42/renew",
      Some(&auth),
      Some(json!({
        "credits": 4,
        "until": "2024-06-30",
        "as_of": "2024-03-01",
      })),
    )
    .await;
    let renewal = body_json(resp).await;
    assert_eq!(renewal["enrollment_end"], "2024-06-30");
    assert_eq!(renewal["total_credits"], 4);
    assert_eq!(renewal["remaining_credits"], 5);
  }

  #[tokio::test]
  async fn zero_credit_renewals_are_rejected() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, ADMIN_PASS);
    seed_member(&state, &member(42, 1)).await;

    let resp = send(
      state,
      "POST",
      "/members/42/renew",
      Some(&auth),
      Some(json!({ "credits": 0 })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  // ── Reconciliation ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn reconciliation_debits_elapsed_occurrences() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, ADMIN_PASS);
    seed_member(&state, &member(42, 8)).await;

    // Mondays and Wednesdays, 2024-01-01 through the 17th: six dates.
    let resp = send(
      state.clone(),
      "POST",
      "/reconcile",
      Some(&auth),
      Some(json!({ "as_of": "2024-01-17" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let report = body_json(resp).await;
    assert_eq!(report["today"], "2024-01-17");
    assert_eq!(report["new_entries"], 6);
    assert_eq!(report["ledger_created"], Value::Bool(true));
    assert_eq!(report["members"][0]["outcome"], "debited");
    assert_eq!(report["members"][0]["occurrences"], 6);
    assert_eq!(report["members"][0]["remaining_before"], 8);
    assert_eq!(report["members"][0]["remaining_after"], 2);

    // Same horizon again: nothing new to debit.
    let resp = send(
      state,
      "POST",
      "/reconcile",
      Some(&auth),
      Some(json!({ "as_of": "2024-01-17" })),
    )
    .await;
    let report = body_json(resp).await;
    assert_eq!(report["new_entries"], 0);
    assert_eq!(report["ledger_created"], Value::Bool(false));
    assert_eq!(report["members"][0]["outcome"], "up_to_date");
  }

  #[tokio::test]
  async fn skips_are_reported_not_silent() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, ADMIN_PASS);

    let mut exhausted = member(1, 0);
    exhausted.name = "kredisi biten".to_string();
    let mut undated = member(2, 5);
    undated.enrollment_start = None;
    let mut unscheduled = member(3, 5);
    unscheduled.scheduled_weekdays = WeekdaySet::empty();
    seed_member(&state, &exhausted).await;
    seed_member(&state, &undated).await;
    seed_member(&state, &unscheduled).await;

    let resp = send(
      state,
      "POST",
      "/reconcile",
      Some(&auth),
      Some(json!({ "as_of": "2024-01-17" })),
    )
    .await;
    let report = body_json(resp).await;
    assert_eq!(report["new_entries"], 0);
    let members = report["members"].as_array().unwrap();
    assert_eq!(members.len(), 3);
    for line in members {
      assert_eq!(line["outcome"], "skipped");
    }
    assert_eq!(members[0]["reason"], "no_remaining_credits");
    assert_eq!(members[1]["reason"], "start_date_missing");
    assert_eq!(members[2]["reason"], "no_scheduled_days");
  }

  #[tokio::test]
  async fn the_ledger_filters_by_member() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, ADMIN_PASS);
    seed_member(&state, &member(42, 8)).await;
    seed_member(&state, &member(43, 8)).await;

    send(
      state.clone(),
      "POST",
      "/reconcile",
      Some(&auth),
      Some(json!({ "as_of": "2024-01-17" })),
    )
    .await;

    let resp = send(
      state.clone(),
      "GET",
      "/ledger?member_id=42",
      Some(&auth),
      None,
    )
    .await;
    let entries = body_json(resp).await;
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 6);
    assert!(entries.iter().all(|e| e["member_id"] == 42));
    assert!(entries.iter().all(|e| e["source"] == "automatic"));

    let resp = send(state, "GET", "/ledger", Some(&auth), None).await;
    assert_eq!(body_json(resp).await.as_array().unwrap().len(), 12);
  }

  #[tokio::test]
  async fn enrolment_triggers_an_immediate_catchup() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, ADMIN_PASS);

    // A backdated start with a weekly slot: the post-enrolment pass has
    // elapsed occurrences to debit no matter what today is.
    let mut body = quiet_enrolment("Deniz Kaya");
    body["scheduled_weekdays"] = json!(["monday"]);
    body["initial_credits"] = json!(3);

    let resp =
      send(state.clone(), "POST", "/members", Some(&auth), Some(body)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    let id = created["member"]["id"].as_i64().unwrap();

    let uri  = format!("/ledger?member_id={id}");
    let resp = send(state.clone(), "GET", &uri, Some(&auth), None).await;
    assert!(!body_json(resp).await.as_array().unwrap().is_empty());

    let uri  = format!("/members/{id}");
    let resp = send(state, "GET", &uri, Some(&auth), None).await;
    assert_eq!(body_json(resp).await["member"]["remaining_credits"], 0);
  }

  // ── Alerts ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn alerts_split_expiring_from_ended() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, ADMIN_PASS);
    let today = date(2024, 1, 17);

    let mut ending_soon = member(1, 5);
    ending_soon.enrollment_end = Some(today + chrono::Duration::days(3));
    let mut low_credits = member(2, 1);
    low_credits.enrollment_end = Some(today + chrono::Duration::days(60));
    let mut just_ended = member(3, 5);
    just_ended.enrollment_end = Some(today - chrono::Duration::days(2));
    let mut healthy = member(4, 10);
    healthy.enrollment_end = Some(today + chrono::Duration::days(60));
    for m in [&ending_soon, &low_credits, &just_ended, &healthy] {
      seed_member(&state, m).await;
    }

    let resp =
      send(state, "GET", "/alerts?as_of=2024-01-17", Some(&auth), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let alerts = body_json(resp).await;

    let ids = |list: &Value| -> Vec<i64> {
      list
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["member"]["id"].as_i64().unwrap())
        .collect()
    };
    assert_eq!(ids(&alerts["expiring"]), vec![1, 2]);
    assert_eq!(ids(&alerts["ended"]), vec![3]);
  }

  // ── Admin accounts ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn admins_can_be_minted_and_used() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, ADMIN_PASS);

    let resp = send(
      state.clone(),
      "POST",
      "/admins",
      Some(&auth),
      Some(json!({ "username": "yeni", "password": "parola" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(body_json(resp).await["username"], "yeni");

    let minted = basic("yeni", "parola");
    let resp   = send(state, "GET", "/members", Some(&minted), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn blank_admin_usernames_are_rejected() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, ADMIN_PASS);
    let resp  = send(
      state,
      "POST",
      "/admins",
      Some(&auth),
      Some(json!({ "username": "   ", "password": "x" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn password_changes_rotate_the_credential() {
    let state = make_state().await;
    let auth  = basic(ADMIN_USER, ADMIN_PASS);

    let resp = send(
      state.clone(),
      "PUT",
      "/admins/admin/password",
      Some(&auth),
      Some(json!({ "password": "dondurulmus" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let stale = send(state.clone(), "GET", "/members", Some(&auth), None).await;
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);

    let fresh = basic(ADMIN_USER, "dondurulmus");
    let resp  = send(state, "GET", "/members", Some(&fresh), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }
}
