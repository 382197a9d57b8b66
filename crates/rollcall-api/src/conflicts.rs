//! Handlers for `/conflicts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/conflicts` | Optional `?unresolved=true&reg_no=&limit=` |
//! | `POST` | `/conflicts/{id}/resolve` | 404 if not found |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use rollcall_core::{
  record::{ConflictQuery, ConflictRecord},
  store::AttendanceStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Admin, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub unresolved: bool,
  pub reg_no:     Option<String>,
  pub limit:      Option<usize>,
}

/// `GET /conflicts[?unresolved=true][&reg_no=<reg_no>]`
pub async fn list<S>(
  _admin: Admin,
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ConflictRecord>>, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  let query = ConflictQuery {
    unresolved_only: params.unresolved,
    reg_no:          params.reg_no,
    limit:           params.limit,
  };
  let conflicts = state
    .store
    .list_conflicts(&query)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(conflicts))
}

// ─── Resolve ──────────────────────────────────────────────────────────────────

/// `POST /conflicts/{id}/resolve`
pub async fn resolve<S>(
  _admin: Admin,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ConflictRecord>, ApiError>
where
  S: AttendanceStore + Clone + 'static,
{
  let conflict = state
    .store
    .resolve_conflict(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("conflict {id} not found")))?;
  Ok(Json(conflict))
}
