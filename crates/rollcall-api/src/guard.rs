//! Boundary checks applied to a biometric upload before it reaches the
//! parser.

use axum::{
  body::Body,
  http::{HeaderMap, header},
};
use bytes::Bytes;

use crate::error::ApiError;

const ALLOWED_EXTENSIONS: [&str; 2] = ["dat", "txt"];

const ALLOWED_CONTENT_TYPES: [&str; 2] = ["text/plain", "application/octet-stream"];

/// Checks that need only the request line and headers.
pub fn check_request(file_name: &str, headers: &HeaderMap) -> Result<(), ApiError> {
  check_file_name(file_name)?;
  check_content_type(headers)
}

/// Buffer the request body, failing once it exceeds `max_bytes`.
pub async fn read_body(body: Body, max_bytes: usize) -> Result<Bytes, ApiError> {
  axum::body::to_bytes(body, max_bytes)
    .await
    .map_err(|_| ApiError::PayloadTooLarge(format!("file exceeds the {max_bytes} byte limit")))
}

/// The name must end in `.dat` or `.txt`, case-insensitively.
pub fn check_file_name(file_name: &str) -> Result<(), ApiError> {
  let ext = file_name
    .rsplit_once('.')
    .map(|(_, ext)| ext.to_ascii_lowercase());
  match ext {
    Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
    _ => Err(ApiError::BadRequest(format!(
      "unsupported file type {file_name:?}; expected .dat or .txt"
    ))),
  }
}

/// A missing `Content-Type` is accepted; a present one must be plain text or
/// an octet stream. Parameters such as `charset` are ignored.
pub fn check_content_type(headers: &HeaderMap) -> Result<(), ApiError> {
  let Some(value) = headers.get(header::CONTENT_TYPE) else {
    return Ok(());
  };
  let essence = value
    .to_str()
    .ok()
    .and_then(|v| v.split(';').next())
    .map(|v| v.trim().to_ascii_lowercase());
  match essence {
    Some(mime) if ALLOWED_CONTENT_TYPES.contains(&mime.as_str()) => Ok(()),
    _ => Err(ApiError::BadRequest(
      "content type must be text/plain or application/octet-stream".into(),
    )),
  }
}

/// Printable ASCII plus TAB, LF and CR only, and at least one
/// `DDDD-DD-DD` somewhere in the file.
pub fn check_plain_text(body: &[u8]) -> Result<(), ApiError> {
  let printable = body
    .iter()
    .all(|&b| matches!(b, b'\t' | b'\n' | b'\r' | 0x20..=0x7e));
  if !printable {
    return Err(ApiError::BadRequest(
      "file contains binary or non-ASCII data".into(),
    ));
  }
  if !body.windows(10).any(is_date_shape) {
    return Err(ApiError::BadRequest("file contains no dates".into()));
  }
  Ok(())
}

fn is_date_shape(window: &[u8]) -> bool {
  window.iter().enumerate().all(|(i, c)| match i {
    4 | 7 => *c == b'-',
    _ => c.is_ascii_digit(),
  })
}
