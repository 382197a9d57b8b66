//! Handlers for `/users` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/users` | `?semester=<n>` and/or `?reg_no_prefix=<digits>`; students only |
//! | `POST` | `/users` | Body: [`NewUser`]; 409 if the regNo is taken |
//! | `GET`  | `/users/{id}` | 404 if not found |
//! | `PUT`  | `/users/{id}` | Body: [`UserUpdate`] |
//! | `POST` | `/users/{id}/active` | Body: `{"active":false}` |
//! | `POST` | `/users/{id}/password` | Body: `{"password":"..."}`; enables login |

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use rollcall_core::{
  store::AttendanceStore,
  user::{NewUser, StudentFilter, User, UserUpdate, validate_semester},
};
use rand_core::OsRng;
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Admin, error::ApiError};

// ─── Filter ───────────────────────────────────────────────────────────────────

/// `GET /users?semester=<n>&reg_no_prefix=<digits>`
pub async fn filter<S>(
  _admin: Admin,
  State(state): State<AppState<S>>,
  Query(filter): Query<StudentFilter>,
) -> Result<Json<Vec<User>>, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  if filter.is_empty() {
    return Err(ApiError::BadRequest(
      "at least one of semester or reg_no_prefix is required".into(),
    ));
  }
  let users = state
    .store
    .filter_students(&filter)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(users))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /users`
pub async fn create<S>(
  _admin: Admin,
  State(state): State<AppState<S>>,
  Json(body): Json<NewUser>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  body.validate(state.parser.config())?;
  let reg_no = body.reg_no.clone();
  let user = state
    .store
    .add_user(body)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::Conflict(format!("reg_no {reg_no} already exists")))?;
  Ok((StatusCode::CREATED, Json(user)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /users/{id}`
pub async fn get_one<S>(
  _admin: Admin,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  let user = state
    .store
    .get_user(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))?;
  Ok(Json(user))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /users/{id}`
///
/// An existing `course_start_date` is kept even if the body supplies one.
pub async fn update<S>(
  _admin: Admin,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<UserUpdate>,
) -> Result<Json<User>, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  if let Some(semester) = body.semester {
    validate_semester(semester)?;
  }
  let user = state
    .store
    .update_user(id, body)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))?;
  Ok(Json(user))
}

// ─── Activate / deactivate ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActiveBody {
  pub active: bool,
}

/// `POST /users/{id}/active`
pub async fn set_active<S>(
  _admin: Admin,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ActiveBody>,
) -> Result<Json<User>, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  let user = state
    .store
    .set_user_active(id, body.active)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))?;
  Ok(Json(user))
}

// ─── Password ─────────────────────────────────────────────────────────────────

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct PasswordBody {
  pub password: String,
}

/// `POST /users/{id}/password`
pub async fn set_password<S>(
  admin: Admin,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<PasswordBody>,
) -> Result<StatusCode, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  if body.password.chars().count() < MIN_PASSWORD_LEN {
    return Err(ApiError::BadRequest(format!(
      "password must be at least {MIN_PASSWORD_LEN} characters"
    )));
  }
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(body.password.as_bytes(), &salt)
    .map_err(|e| ApiError::Store(e.to_string().into()))?
    .to_string();

  let user = state
    .store
    .set_password_hash(id, hash)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))?;
  tracing::info!(by = %admin.username, reg_no = %user.reg_no, "password set");
  Ok(StatusCode::NO_CONTENT)
}
