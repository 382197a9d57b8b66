//! JSON REST API for Rollcall.
//!
//! Exposes an axum [`Router`] backed by any
//! [`rollcall_core::store::AttendanceStore`]. Admin routes take Basic auth
//! for the configured service account, or a bearer token from a login
//! session held by an admin or developer. `/me` routes take any session
//! token. `GET /public/last-update` and the `/auth` login steps are open.
//! TLS and transport concerns are the caller's responsibility.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/uploads/biometric?file_name=&upload_type=` | Raw file body |
//! | `GET`  | `/uploads` | Newest first, `?limit=` |
//! | `POST` | `/uploads/revert` | Body: `{"count":5}` |
//! | `GET`  | `/public/last-update` | Unauthenticated |
//! | `GET`  | `/conflicts` | `?unresolved=true&reg_no=` |
//! | `POST` | `/conflicts/{id}/resolve` | |
//! | `GET`  | `/users` | `?semester=&reg_no_prefix=`, one required |
//! | `POST` | `/users` | 409 on a taken regNo |
//! | `GET`/`PUT` | `/users/{id}` | |
//! | `POST` | `/users/{id}/active` | Body: `{"active":false}` |
//! | `GET`/`POST` | `/holidays` | `?from=&to=` on `GET` |
//! | `GET`  | `/attendance/{reg_no}` | `?from=&to=` |
//! | `POST` | `/semesters/{semester}/promote` | |
//! | `DELETE` | `/semesters/{semester}/attendance` | Clears without promoting |
//! | `POST` | `/users/{id}/password` | Sets the login password |
//! | `POST` | `/auth/login` | Password check, sends a login code |
//! | `POST` | `/auth/verify` | Login code for a bearer token |
//! | `POST` | `/auth/logout` | |
//! | `GET`  | `/me` | Session user's profile |
//! | `GET`  | `/me/attendance` | Students only, `?from=&to=` |

pub mod attendance;
pub mod auth;
pub mod conflicts;
pub mod error;
pub mod guard;
pub mod holidays;
pub mod login;
pub mod me;
pub mod semesters;
pub mod uploads;
pub mod users;

use std::{
  path::PathBuf,
  sync::{Arc, Mutex},
};

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{delete, get, post},
};
use rollcall_core::{
  IngestConfig,
  login::{LoginPolicy, OtpDelivery, OtpTracker, SessionRegistry},
  parse::Parser,
  store::AttendanceStore,
};
use serde::Deserialize;

pub use error::ApiError;

use auth::AuthConfig;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `ROLLCALL_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  pub auth_username:      String,
  pub auth_password_hash: String,
  #[serde(default = "default_max_upload_bytes")]
  pub max_upload_bytes:   usize,
  #[serde(default)]
  pub ingest:             IngestConfig,
  #[serde(default)]
  pub login:              LoginPolicy,
}

fn default_max_upload_bytes() -> usize { 2 * 1024 * 1024 }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: AttendanceStore> {
  pub store:    Arc<S>,
  pub parser:   Arc<Parser>,
  pub config:   Arc<ServerConfig>,
  pub auth:     Arc<AuthConfig>,
  /// Never held across an `.await`.
  pub otp:      Arc<Mutex<OtpTracker>>,
  pub sessions: Arc<Mutex<SessionRegistry>>,
  pub delivery: Arc<dyn OtpDelivery>,
}

impl<S: AttendanceStore> AppState<S> {
  /// Assemble state from a store and a loaded config. Fails if the ingest
  /// settings are invalid.
  pub fn new(store: S, config: ServerConfig) -> rollcall_core::Result<Self> {
    let parser = Parser::new(config.ingest.clone())?;
    let auth = AuthConfig {
      username:      config.auth_username.clone(),
      password_hash: config.auth_password_hash.clone(),
    };
    let otp = OtpTracker::new(config.login.clone());
    let sessions = SessionRegistry::new(&config.login);
    Ok(Self {
      store:    Arc::new(store),
      parser:   Arc::new(parser),
      config:   Arc::new(config),
      auth:     Arc::new(auth),
      otp:      Arc::new(Mutex::new(otp)),
      sessions: Arc::new(Mutex::new(sessions)),
      delivery: Arc::new(login::LogDelivery),
    })
  }

  /// Replace the login code transport.
  pub fn with_delivery(mut self, delivery: impl OtpDelivery + 'static) -> Self {
    self.delivery = Arc::new(delivery);
    self
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// Request bodies are capped at `max_upload_bytes`. The upload route reads
/// its body itself and answers oversize files with a JSON `413`.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: AttendanceStore + Clone + 'static,
{
  let body_limit = state.config.max_upload_bytes;
  Router::new()
    // Uploads
    .route("/uploads", get(uploads::list::<S>))
    .route("/uploads/biometric", post(uploads::upload::<S>))
    .route("/uploads/revert", post(uploads::revert::<S>))
    .route("/public/last-update", get(uploads::last_update::<S>))
    // Conflicts
    .route("/conflicts", get(conflicts::list::<S>))
    .route("/conflicts/{id}/resolve", post(conflicts::resolve::<S>))
    // Users
    .route("/users", get(users::filter::<S>).post(users::create::<S>))
    .route("/users/{id}", get(users::get_one::<S>).put(users::update::<S>))
    .route("/users/{id}/active", post(users::set_active::<S>))
    .route("/users/{id}/password", post(users::set_password::<S>))
    // Holidays
    .route("/holidays", get(holidays::list::<S>).post(holidays::create::<S>))
    // Reports
    .route("/attendance/{reg_no}", get(attendance::report::<S>))
    // Semesters
    .route("/semesters/{semester}/promote", post(semesters::promote::<S>))
    .route("/semesters/{semester}/attendance", delete(semesters::clear_attendance::<S>))
    // Login
    .route("/auth/login", post(login::login::<S>))
    .route("/auth/verify", post(login::verify::<S>))
    .route("/auth/logout", post(login::logout::<S>))
    .route("/me", get(me::profile::<S>))
    .route("/me/attendance", get(me::attendance::<S>))
    .layer(DefaultBodyLimit::max(body_limit))
    .with_state(state)
}
