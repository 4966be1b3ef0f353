//! Admin account management. Passwords are hashed with argon2 before the
//! store ever sees them; plaintext lives only in the request body.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use courtbook_core::{
  admin::{self, Admin},
  ops::Mutation,
  store::RecordStore,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{
  AppState,
  auth::{AdminSession, hash_password},
  error::ApiError,
};

#[derive(Debug, Deserialize)]
pub struct CreateAdminBody {
  pub username: String,
  pub password: String,
}

/// `POST /admins`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  session: AdminSession,
  Json(body): Json<CreateAdminBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecordStore + Clone + Send + Sync + 'static,
{
  let username = body.username.trim();
  if username.is_empty() {
    return Err(ApiError::BadRequest(
      "username must not be blank".to_string(),
    ));
  }
  if body.password.is_empty() {
    return Err(ApiError::BadRequest(
      "password must not be empty".to_string(),
    ));
  }

  let account = Admin {
    username:      username.to_string(),
    password_hash: hash_password(&body.password)?,
  };
  admin::add_admin(state.store.as_ref(), &account).await?;
  info!(admin = username, by = %session.username, "admin created");

  Ok((StatusCode::CREATED, Json(json!({ "username": username }))))
}

#[derive(Debug, Deserialize)]
pub struct PasswordBody {
  pub password: String,
}

/// `PUT /admins/{username}/password`
pub async fn set_password<S>(
  State(state): State<AppState<S>>,
  session: AdminSession,
  Path(username): Path<String>,
  Json(body): Json<PasswordBody>,
) -> Result<StatusCode, ApiError>
where
  S: RecordStore + Clone + Send + Sync + 'static,
{
  if body.password.is_empty() {
    return Err(ApiError::BadRequest(
      "password must not be empty".to_string(),
    ));
  }

  let hash = hash_password(&body.password)?;
  match admin::set_password_hash(state.store.as_ref(), &username, hash)
    .await?
  {
    Mutation::Applied(()) => {
      info!(admin = %username, by = %session.username, "password changed");
      Ok(StatusCode::NO_CONTENT)
    }
    Mutation::NotFound => {
      Err(ApiError::NotFound(format!("admin {username} not found")))
    }
  }
}
