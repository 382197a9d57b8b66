//! Two-step login state: one-time codes and the sessions they unlock.
//!
//! A password check is followed by a short-lived code delivered out of band
//! (see [`OtpDelivery`]). Each user may be sent at most
//! [`LoginPolicy::otp_max_per_day`] codes per UTC day. Verifying the latest
//! code opens a [`Session`] identified by an opaque bearer token.
//!
//! Both [`OtpTracker`] and [`SessionRegistry`] are plain values owned by the
//! caller. All time-dependent methods take `now` explicitly.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::user::{Role, User};

// ─── Policy ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPolicy {
  /// Codes a user may request per UTC day. `0` disables the cap.
  #[serde(default = "default_otp_max_per_day")]
  pub otp_max_per_day:    u32,
  #[serde(default = "default_otp_expire_minutes")]
  pub otp_expire_minutes: i64,
  #[serde(default = "default_session_ttl_hours")]
  pub session_ttl_hours:  i64,
}

fn default_otp_max_per_day() -> u32 { 3 }

fn default_otp_expire_minutes() -> i64 { 10 }

fn default_session_ttl_hours() -> i64 { 12 }

impl Default for LoginPolicy {
  fn default() -> Self {
    Self {
      otp_max_per_day:    default_otp_max_per_day(),
      otp_expire_minutes: default_otp_expire_minutes(),
      session_ttl_hours:  default_session_ttl_hours(),
    }
  }
}

// ─── Delivery ────────────────────────────────────────────────────────────────

/// Out-of-band transport for login codes (email in production).
pub trait OtpDelivery: Send + Sync {
  fn deliver(
    &self,
    user: &User,
    code: &str,
    expires_at: DateTime<Utc>,
  ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

// ─── Codes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OtpError {
  #[error("code request limit reached for today")]
  LimitReached,
  #[error("no code has been issued")]
  NotIssued,
  #[error("code has expired")]
  Expired,
  #[error("code is incorrect")]
  Mismatch,
}

#[derive(Debug, Clone)]
struct PendingOtp {
  code:       String,
  expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct OtpState {
  /// UTC day `sent_today` refers to.
  day:        NaiveDate,
  sent_today: u32,
  pending:    Option<PendingOtp>,
}

/// Per-user code issuance counters and the outstanding code, if any.
#[derive(Debug, Clone)]
pub struct OtpTracker {
  policy: LoginPolicy,
  users:  HashMap<Uuid, OtpState>,
}

impl OtpTracker {
  pub fn new(policy: LoginPolicy) -> Self {
    Self { policy, users: HashMap::new() }
  }

  pub fn policy(&self) -> &LoginPolicy { &self.policy }

  /// Whether another code may be sent to `user_id` today.
  pub fn can_send(&self, user_id: Uuid, now: DateTime<Utc>) -> bool {
    if self.policy.otp_max_per_day == 0 {
      return true;
    }
    match self.users.get(&user_id) {
      Some(state) if state.day == now.date_naive() => {
        state.sent_today < self.policy.otp_max_per_day
      }
      _ => true,
    }
  }

  /// Record `code` as the outstanding code for `user_id`, replacing any
  /// earlier one, and return its expiry.
  pub fn issue(
    &mut self,
    user_id: Uuid,
    code: String,
    now: DateTime<Utc>,
  ) -> Result<DateTime<Utc>, OtpError> {
    if !self.can_send(user_id, now) {
      return Err(OtpError::LimitReached);
    }
    let today = now.date_naive();
    let expires_at = now + Duration::minutes(self.policy.otp_expire_minutes);

    let state = self.users.entry(user_id).or_insert(OtpState {
      day:        today,
      sent_today: 0,
      pending:    None,
    });
    if state.day != today {
      state.day = today;
      state.sent_today = 0;
    }
    state.sent_today += 1;
    state.pending = Some(PendingOtp { code, expires_at });
    Ok(expires_at)
  }

  /// Check `code` against the outstanding code. A matching or expired code
  /// is consumed; a wrong one is left in place.
  pub fn verify(
    &mut self,
    user_id: Uuid,
    code: &str,
    now: DateTime<Utc>,
  ) -> Result<(), OtpError> {
    let state = self.users.get_mut(&user_id).ok_or(OtpError::NotIssued)?;
    let pending = state.pending.as_ref().ok_or(OtpError::NotIssued)?;

    if pending.expires_at < now {
      state.pending = None;
      return Err(OtpError::Expired);
    }
    if pending.code != code {
      return Err(OtpError::Mismatch);
    }
    state.pending = None;
    Ok(())
  }

  /// Drop bookkeeping for users with no live code and no sends today.
  pub fn prune(&mut self, now: DateTime<Utc>) {
    let today = now.date_naive();
    self.users.retain(|_, s| {
      s.day == today || s.pending.as_ref().is_some_and(|p| p.expires_at >= now)
    });
  }
}

// ─── Sessions ────────────────────────────────────────────────────────────────

/// An authenticated login, addressed by its bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub user_id:    Uuid,
  pub reg_no:     String,
  pub role:       Role,
  pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionRegistry {
  ttl:      Duration,
  sessions: HashMap<String, Session>,
}

impl SessionRegistry {
  pub fn new(policy: &LoginPolicy) -> Self {
    Self {
      ttl:      Duration::hours(policy.session_ttl_hours),
      sessions: HashMap::new(),
    }
  }

  /// Open a session for `user` under `token`.
  pub fn open(&mut self, token: String, user: &User, now: DateTime<Utc>) -> Session {
    let session = Session {
      user_id:    user.user_id,
      reg_no:     user.reg_no.clone(),
      role:       user.role,
      expires_at: now + self.ttl,
    };
    self.sessions.retain(|_, s| s.expires_at >= now);
    self.sessions.insert(token, session.clone());
    session
  }

  /// The live session for `token`, if any. Expired sessions are removed.
  pub fn get(&mut self, token: &str, now: DateTime<Utc>) -> Option<Session> {
    match self.sessions.get(token) {
      Some(s) if s.expires_at >= now => Some(s.clone()),
      Some(_) => {
        self.sessions.remove(token);
        None
      }
      None => None,
    }
  }

  pub fn close(&mut self, token: &str) -> bool {
    self.sessions.remove(token).is_some()
  }
}
