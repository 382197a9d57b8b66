//! `GET /attendance/{reg_no}`: a student's day records, holidays and
//! percentage over a window.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{NaiveDate, Utc};
use rollcall_core::{
  report::{AttendanceReport, report_range},
  store::AttendanceStore,
  user::User,
};
use serde::Deserialize;

use crate::{AppState, auth::Admin, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ReportParams {
  pub from: Option<NaiveDate>,
  pub to:   Option<NaiveDate>,
}

/// `GET /attendance/{reg_no}[?from=<date>][&to=<date>]`
///
/// `from` defaults to the course start date, `to` to the course end date or
/// today.
pub async fn report<S>(
  _admin: Admin,
  State(state): State<AppState<S>>,
  Path(reg_no): Path<String>,
  Query(params): Query<ReportParams>,
) -> Result<Json<AttendanceReport>, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  let user = state
    .store
    .get_user_by_reg_no(&reg_no)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("no user with reg_no {reg_no}")))?;

  Ok(Json(build_report(&state, user, params).await?))
}

/// Assemble the report for `user` over the window `params` selects.
pub(crate) async fn build_report<S>(
  state: &AppState<S>,
  user: User,
  params: ReportParams,
) -> Result<AttendanceReport, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  let range = report_range(&user, params.from, params.to, Utc::now().date_naive())?;

  let records = state
    .store
    .day_records_for_reg_no(&user.reg_no, range.from, range.to)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  let holidays = state
    .store
    .holidays_between(range.from, range.to)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  Ok(AttendanceReport::new(user.reg_no, range, records, holidays))
}
