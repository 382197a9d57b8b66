//! Handlers for `/uploads` endpoints and the public last-update check.

use axum::{
  Json,
  body::Body,
  extract::{Query, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use rollcall_core::{
  ingest::{IngestOutcome, IngestRequest, ingest},
  record::{RevertOutcome, UploadRecord, UploadType},
  store::AttendanceStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::Admin, error::ApiError, guard};

// ─── Upload ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UploadParams {
  pub file_name:   String,
  #[serde(default)]
  pub upload_type: UploadType,
}

/// `POST /uploads/biometric?file_name=<name>[&upload_type=<type>]`
///
/// The body is the raw device export, at most `max_upload_bytes` long.
/// Responds `201` with the ingest report, or `400` with the parse summary
/// when no line was usable.
pub async fn upload<S>(
  admin: Admin,
  State(state): State<AppState<S>>,
  Query(params): Query<UploadParams>,
  headers: HeaderMap,
  body: Body,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  guard::check_request(&params.file_name, &headers)?;
  let body = guard::read_body(body, state.config.max_upload_bytes).await?;
  guard::check_plain_text(&body)?;

  let request = IngestRequest {
    raw:          &body,
    file_name:    params.file_name,
    upload_type:  params.upload_type,
    submitted_by: admin.username,
    today:        Utc::now().date_naive(),
  };
  let outcome = ingest(state.store.as_ref(), &state.parser, request)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  match outcome {
    IngestOutcome::NoValidRecords(summary) => {
      Err(ApiError::UnprocessableUpload { summary })
    }
    IngestOutcome::Ingested { report, .. } => {
      Ok((StatusCode::CREATED, Json(report)))
    }
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default = "default_list_limit")]
  pub limit: usize,
}

fn default_list_limit() -> usize { 50 }

/// `GET /uploads[?limit=<n>]`
pub async fn list<S>(
  _admin: Admin,
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<UploadRecord>>, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  let uploads = state
    .store
    .list_uploads(params.limit)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(uploads))
}

// ─── Revert ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RevertBody {
  #[serde(default = "default_revert_count")]
  pub count: usize,
}

fn default_revert_count() -> usize { 5 }

/// `POST /uploads/revert` with body `{"count":5}`
///
/// Removes the newest `count` uploads along with the day records they last
/// wrote and the conflicts they raised.
pub async fn revert<S>(
  admin: Admin,
  State(state): State<AppState<S>>,
  Json(body): Json<RevertBody>,
) -> Result<Json<RevertOutcome>, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  if body.count == 0 {
    return Err(ApiError::BadRequest("count must be at least 1".into()));
  }
  let outcome = state
    .store
    .revert_latest_uploads(body.count)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  tracing::info!(
    by = %admin.username,
    uploads = outcome.uploads_reverted,
    day_records = outcome.day_records_deleted,
    conflicts = outcome.conflicts_deleted,
    "uploads reverted"
  );
  Ok(Json(outcome))
}

// ─── Last update ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LastUpdate {
  pub upload_id:   Uuid,
  pub last_update: DateTime<Utc>,
}

/// `GET /public/last-update`
pub async fn last_update<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<LastUpdate>, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  let upload = state
    .store
    .latest_upload()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound("no uploads yet".into()))?;
  Ok(Json(LastUpdate {
    upload_id:   upload.upload_id,
    last_update: upload.created_at,
  }))
}
