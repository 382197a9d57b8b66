//! `POST /semesters/{semester}/promote` and
//! `DELETE /semesters/{semester}/attendance`.

use axum::{
  Json,
  extract::{Path, State},
};
use rollcall_core::{
  store::AttendanceStore,
  user::{PromotionOutcome, SemesterClearOutcome, validate_semester},
};

use crate::{AppState, auth::Admin, error::ApiError};

/// Clear the semester's attendance and move its active students up one
/// semester. Students in the final semester are deactivated instead.
pub async fn promote<S>(
  admin: Admin,
  State(state): State<AppState<S>>,
  Path(semester): Path<u8>,
) -> Result<Json<PromotionOutcome>, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  validate_semester(semester)?;
  let outcome = state
    .store
    .promote_semester(semester)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  if outcome.students == 0 {
    return Err(ApiError::NotFound(format!(
      "no active students in semester {semester}"
    )));
  }
  tracing::info!(
    by = %admin.username,
    semester,
    students = outcome.students,
    graduated = outcome.graduated,
    "semester promoted"
  );
  Ok(Json(outcome))
}

/// Delete the attendance of the semester's active students and leave the
/// students where they are. `404` when nothing was deleted.
pub async fn clear_attendance<S>(
  admin: Admin,
  State(state): State<AppState<S>>,
  Path(semester): Path<u8>,
) -> Result<Json<SemesterClearOutcome>, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  validate_semester(semester)?;
  let outcome = state
    .store
    .clear_semester_attendance(semester)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  if outcome.day_records_deleted == 0 {
    return Err(ApiError::NotFound(format!(
      "no attendance recorded for semester {semester}"
    )));
  }
  tracing::info!(
    by = %admin.username,
    semester,
    deleted = outcome.day_records_deleted,
    "semester attendance cleared"
  );
  Ok(Json(outcome))
}
