//! API error type and its HTTP mapping.

use axum::{
  Json,
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use courtbook_core::store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
  /// Missing or wrong credentials. Deliberately carries no detail.
  #[error("unauthorized")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("store error: {0}")]
  Store(#[from] StoreError),

  #[error("internal error: {0}")]
  Internal(String),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Store(_) | ApiError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    let body = Json(json!({ "error": self.to_string() }));

    if status == StatusCode::UNAUTHORIZED {
      (
        status,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"courtbook\"")],
        body,
      )
        .into_response()
    } else {
      (status, body).into_response()
    }
  }
}
