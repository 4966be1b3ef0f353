//! HTTP Basic authentication against the administrator table.
//!
//! Every route requires an [`AdminSession`], extracted from the
//! `Authorization` header and checked against a stored argon2 hash. The
//! admin's identity rides along into handlers so writes can say who made
//! them.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use courtbook_core::{admin, store::RecordStore};
use rand_core::OsRng;

use crate::{AppState, error::ApiError};

/// Proof of authentication: the administrator the request presented.
#[derive(Debug, Clone)]
pub struct AdminSession {
  pub username: String,
}

impl<S> FromRequestParts<AppState<S>> for AdminSession
where
  S: RecordStore + Clone + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let (username, password) = decode_basic(&parts.headers)?;
    let admin = admin::find_admin(state.store.as_ref(), &username)
      .await?
      .ok_or(ApiError::Unauthorized)?;
    verify_password(&password, &admin.password_hash)?;
    Ok(AdminSession { username })
  }
}

/// Split a `Basic` Authorization header into `(username, password)`.
fn decode_basic(
  headers: &axum::http::HeaderMap,
) -> Result<(String, String), ApiError> {
  let header = headers
    .get(header::AUTHORIZATION)
    .and_then(|value| value.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;
  let encoded = header.strip_prefix("Basic ").ok_or(ApiError::Unauthorized)?;
  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let decoded =
    String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;
  let (username, password) =
    decoded.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok((username.to_string(), password.to_string()))
}

/// Check a presented password against a stored PHC string.
pub fn verify_password(password: &str, phc: &str) -> Result<(), ApiError> {
  let parsed = PasswordHash::new(phc).map_err(|_| ApiError::Unauthorized)?;
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .map_err(|_| ApiError::Unauthorized)
}

/// Hash a password into a fresh argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|err| ApiError::Internal(format!("argon2: {err}")))?
      .to_string(),
  )
}
