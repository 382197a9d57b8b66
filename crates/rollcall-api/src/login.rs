//! Handlers for the two-step login flow.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/login` | Body: `{"reg_no","password"}`; sends a login code |
//! | `POST` | `/auth/verify` | Body: `{"reg_no","otp"}`; returns a bearer token |
//! | `POST` | `/auth/logout` | Bearer token required |

use std::sync::PoisonError;

use axum::{
  Json,
  extract::State,
  http::StatusCode,
};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use rollcall_core::{
  login::{OtpDelivery, OtpError},
  store::AttendanceStore,
  user::{Role, User},
};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  auth::{SessionUser, verify_password},
  error::ApiError,
};

// ─── Delivery ─────────────────────────────────────────────────────────────────

/// Writes login codes to the log instead of sending them. The code itself
/// only appears at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDelivery;

impl OtpDelivery for LogDelivery {
  fn deliver(
    &self,
    user: &User,
    code: &str,
    expires_at: DateTime<Utc>,
  ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing::info!(
      reg_no = %user.reg_no,
      email = user.email.as_deref().unwrap_or("-"),
      %expires_at,
      "login code issued"
    );
    tracing::debug!(reg_no = %user.reg_no, code, "login code");
    Ok(())
  }
}

/// A uniformly drawn six-digit code.
fn generate_code() -> String {
  const SPAN: u32 = 900_000;
  let zone = u32::MAX - u32::MAX % SPAN;
  loop {
    let v = OsRng.next_u32();
    if v < zone {
      return (100_000 + v % SPAN).to_string();
    }
  }
}

fn generate_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  URL_SAFE_NO_PAD.encode(bytes)
}

// ─── Login ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub reg_no:   String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct OtpSent {
  pub otp_sent:   bool,
  pub expires_at: DateTime<Utc>,
}

/// `POST /auth/login`
///
/// Unknown and inactive users get `404`, a wrong password `401`, and a user
/// who has used up today's codes `429`.
pub async fn login<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<LoginBody>,
) -> Result<Json<OtpSent>, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  let creds = state
    .store
    .credentials_by_reg_no(&body.reg_no)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .filter(|c| c.user.is_active)
    .ok_or_else(|| ApiError::NotFound(format!("no active user with reg_no {}", body.reg_no)))?;

  let hash = creds.password_hash.as_deref().ok_or(ApiError::Unauthorized)?;
  verify_password(&body.password, hash)?;

  let now = Utc::now();
  let code = generate_code();
  let issued = {
    let mut otp = state.otp.lock().unwrap_or_else(PoisonError::into_inner);
    otp.prune(now);
    otp.issue(creds.user.user_id, code.clone(), now)
  };
  let expires_at = match issued {
    Ok(at) => at,
    Err(e) => {
      tracing::warn!(reg_no = %creds.user.reg_no, "login code limit reached");
      return Err(ApiError::TooManyRequests(e.to_string()));
    }
  };

  state
    .delivery
    .deliver(&creds.user, &code, expires_at)
    .map_err(ApiError::Delivery)?;

  Ok(Json(OtpSent { otp_sent: true, expires_at }))
}

// ─── Verify ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
  pub reg_no: String,
  pub otp:    String,
}

#[derive(Debug, Serialize)]
pub struct SessionToken {
  pub token:      String,
  pub role:       Role,
  pub expires_at: DateTime<Utc>,
}

/// `POST /auth/verify`
///
/// Exchanges the latest login code for a bearer token.
pub async fn verify<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<VerifyBody>,
) -> Result<Json<SessionToken>, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  let user = state
    .store
    .get_user_by_reg_no(&body.reg_no)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .filter(|u| u.is_active)
    .ok_or_else(|| ApiError::NotFound(format!("no active user with reg_no {}", body.reg_no)))?;

  let now = Utc::now();
  let checked = state
    .otp
    .lock()
    .unwrap_or_else(PoisonError::into_inner)
    .verify(user.user_id, body.otp.trim(), now);
  if let Err(e) = checked {
    if e == OtpError::Expired {
      tracing::info!(reg_no = %user.reg_no, "expired login code presented");
    }
    return Err(ApiError::Unauthorized);
  }

  let token = generate_token();
  let session = state
    .sessions
    .lock()
    .unwrap_or_else(PoisonError::into_inner)
    .open(token.clone(), &user, now);

  tracing::info!(reg_no = %user.reg_no, role = %user.role, "session opened");
  Ok(Json(SessionToken { token, role: session.role, expires_at: session.expires_at }))
}

// ─── Logout ───────────────────────────────────────────────────────────────────

/// `POST /auth/logout`
pub async fn logout<S>(
  user: SessionUser,
  State(state): State<AppState<S>>,
) -> StatusCode
where
  S: AttendanceStore + Clone + 'static,
{
  state
    .sessions
    .lock()
    .unwrap_or_else(PoisonError::into_inner)
    .close(&user.token);
  StatusCode::NO_CONTENT
}
