//! Request authentication.
//!
//! Admin routes take either HTTP Basic credentials for the configured
//! service account or a bearer token from a login session whose role may
//! administer. Session routes take a bearer token only.

use std::sync::PoisonError;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::Utc;
use rollcall_core::{login::Session, store::AttendanceStore};

use crate::{AppState, error::ApiError};

/// Credentials accepted as valid for this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// An authenticated administrator. The username is recorded as the
/// submitter of any upload made in the request.
#[derive(Debug, Clone)]
pub struct Admin {
  pub username: String,
}

/// A live login session together with the token that addresses it.
#[derive(Debug, Clone)]
pub struct SessionUser {
  pub token:   String,
  pub session: Session,
}

/// Check `password` against an argon2 PHC string.
pub fn verify_password(password: &str, phc: &str) -> Result<(), ApiError> {
  let parsed_hash = PasswordHash::new(phc).map_err(|_| ApiError::Unauthorized)?;
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)
}

fn authorization(headers: &HeaderMap) -> Result<&str, ApiError> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)
}

/// The token of a `Bearer` authorization header, if that is the scheme used.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  authorization(headers).ok()?.strip_prefix("Bearer ")
}

/// Verify Basic credentials in `headers` and return the username.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<String, ApiError> {
  let header_val = authorization(headers)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  if username != config.username {
    return Err(ApiError::Unauthorized);
  }

  verify_password(password, &config.password_hash)?;

  Ok(username.to_string())
}

fn session_user<S: AttendanceStore>(
  token: &str,
  state: &AppState<S>,
) -> Result<SessionUser, ApiError> {
  let session = state
    .sessions
    .lock()
    .unwrap_or_else(PoisonError::into_inner)
    .get(token, Utc::now())
    .ok_or(ApiError::Unauthorized)?;
  Ok(SessionUser { token: token.to_owned(), session })
}

impl<S> FromRequestParts<AppState<S>> for Admin
where
  S: AttendanceStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    if let Some(token) = bearer_token(&parts.headers) {
      let SessionUser { session, .. } = session_user(token, state)?;
      if !session.role.can_administer() {
        return Err(ApiError::Forbidden);
      }
      return Ok(Admin { username: session.reg_no });
    }
    let username = verify_auth(&parts.headers, &state.auth)?;
    Ok(Admin { username })
  }
}

impl<S> FromRequestParts<AppState<S>> for SessionUser
where
  S: AttendanceStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
    session_user(token, state)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::HeaderValue;

  fn config(password: &str) -> AuthConfig {
    use argon2::{PasswordHasher, password_hash::SaltString};
    use rand_core::OsRng;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    AuthConfig { username: "registrar".to_string(), password_hash: hash }
  }

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  #[test]
  fn correct_credentials_yield_username() {
    let cfg = config("secret");
    let who = verify_auth(&headers(&basic("registrar", "secret")), &cfg).unwrap();
    assert_eq!(who, "registrar");
  }

  #[test]
  fn wrong_password() {
    let cfg = config("secret");
    let r = verify_auth(&headers(&basic("registrar", "nope")), &cfg);
    assert!(matches!(r, Err(ApiError::Unauthorized)));
  }

  #[test]
  fn wrong_username() {
    let cfg = config("secret");
    let r = verify_auth(&headers(&basic("someone", "secret")), &cfg);
    assert!(matches!(r, Err(ApiError::Unauthorized)));
  }

  #[test]
  fn missing_header() {
    let cfg = config("secret");
    assert!(matches!(
      verify_auth(&HeaderMap::new(), &cfg),
      Err(ApiError::Unauthorized)
    ));
  }

  #[test]
  fn bearer_token_is_extracted() {
    assert_eq!(bearer_token(&headers("Bearer abc123")), Some("abc123"));
    assert_eq!(bearer_token(&headers(&basic("registrar", "secret"))), None);
    assert_eq!(bearer_token(&HeaderMap::new()), None);
  }

  #[test]
  fn malformed_hash_is_unauthorized() {
    assert!(matches!(
      verify_password("secret", "not-a-phc-string"),
      Err(ApiError::Unauthorized)
    ));
  }

  #[test]
  fn invalid_base64() {
    let cfg = config("secret");
    let r = verify_auth(&headers("Basic !!!not-base64!!!"), &cfg);
    assert!(matches!(r, Err(ApiError::Unauthorized)));
  }
}
