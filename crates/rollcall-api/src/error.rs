//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use rollcall_core::parse::ParseSummary;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("unauthorized")]
  Unauthorized,

  /// Authenticated, but the role may not use this route.
  #[error("forbidden")]
  Forbidden,

  #[error("too many requests: {0}")]
  TooManyRequests(String),

  #[error("payload too large: {0}")]
  PayloadTooLarge(String),

  /// The file passed the boundary checks but no line yielded a fact.
  #[error("no valid attendance records found")]
  UnprocessableUpload { summary: ParseSummary },

  #[error(transparent)]
  Invalid(#[from] rollcall_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("login code delivery failed: {0}")]
  Delivery(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, json!({ "error": m })),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, json!({ "error": m })),
      ApiError::Unauthorized => {
        let mut res = (
          StatusCode::UNAUTHORIZED,
          Json(json!({ "error": "unauthorized" })),
        )
          .into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"rollcall\""),
        );
        return res;
      }
      ApiError::Forbidden => (StatusCode::FORBIDDEN, json!({ "error": "forbidden" })),
      ApiError::TooManyRequests(m) => {
        (StatusCode::TOO_MANY_REQUESTS, json!({ "error": m }))
      }
      ApiError::PayloadTooLarge(m) => {
        (StatusCode::PAYLOAD_TOO_LARGE, json!({ "error": m }))
      }
      ApiError::UnprocessableUpload { summary } => (
        StatusCode::BAD_REQUEST,
        json!({ "error": self.to_string(), "summary": summary }),
      ),
      ApiError::Invalid(e) => (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() })),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": e.to_string() }))
      }
      ApiError::Delivery(e) => {
        tracing::error!(error = %e, "login code delivery failure");
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": self.to_string() }))
      }
    };
    (status, Json(body)).into_response()
  }
}
