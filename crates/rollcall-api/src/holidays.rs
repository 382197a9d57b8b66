//! Handlers for `/holidays`.

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use rollcall_core::{
  holiday::{Holiday, NewHoliday},
  record::DateRange,
  store::AttendanceStore,
};
use serde::Deserialize;

use crate::{AppState, auth::Admin, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct RangeParams {
  pub from: NaiveDate,
  pub to:   NaiveDate,
}

/// `GET /holidays?from=<date>&to=<date>`
pub async fn list<S>(
  _admin: Admin,
  State(state): State<AppState<S>>,
  Query(params): Query<RangeParams>,
) -> Result<Json<Vec<Holiday>>, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  let range = DateRange::new(params.from, params.to)?;
  let holidays = state
    .store
    .holidays_between(range.from, range.to)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(holidays))
}

/// `POST /holidays` with body `{"date":"2025-08-15","description":"..."}`
pub async fn create<S>(
  _admin: Admin,
  State(state): State<AppState<S>>,
  Json(body): Json<NewHoliday>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  if body.description.trim().is_empty() {
    return Err(ApiError::BadRequest("description must not be empty".into()));
  }
  let date = body.date;
  let holiday = state
    .store
    .add_holiday(body)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::Conflict(format!("holiday on {date} already exists")))?;
  Ok((StatusCode::CREATED, Json(holiday)))
}
