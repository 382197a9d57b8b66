//! Routes for the logged-in user.

use axum::{
  Json,
  extract::{Query, State},
};
use rollcall_core::{
  report::AttendanceReport,
  store::AttendanceStore,
  user::{Role, User},
};

use crate::{
  AppState,
  attendance::{ReportParams, build_report},
  auth::SessionUser,
  error::ApiError,
};

async fn current_user<S>(state: &AppState<S>, user: &SessionUser) -> Result<User, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  state
    .store
    .get_user(user.session.user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .filter(|u| u.is_active)
    .ok_or(ApiError::Unauthorized)
}

/// `GET /me`
pub async fn profile<S>(
  user: SessionUser,
  State(state): State<AppState<S>>,
) -> Result<Json<User>, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  Ok(Json(current_user(&state, &user).await?))
}

/// `GET /me/attendance[?from=<date>][&to=<date>]`
///
/// Students only. The report is always the caller's own.
pub async fn attendance<S>(
  user: SessionUser,
  State(state): State<AppState<S>>,
  Query(params): Query<ReportParams>,
) -> Result<Json<AttendanceReport>, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  if user.session.role != Role::Student {
    return Err(ApiError::Forbidden);
  }
  let me = current_user(&state, &user).await?;
  Ok(Json(build_report(&state, me, params).await?))
}
