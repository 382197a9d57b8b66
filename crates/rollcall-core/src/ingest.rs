//! One upload, end to end: parse the file, record the upload, reconcile.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  parse::{ParseSummary, Parser},
  reconcile::{ReconcileSummary, reconcile},
  record::{NewUpload, UploadRecord, UploadType},
  store::AttendanceStore,
};

/// Everything the caller knows about an incoming file.
#[derive(Debug, Clone)]
pub struct IngestRequest<'a> {
  pub raw:          &'a [u8],
  pub file_name:    String,
  pub upload_type:  UploadType,
  /// Identity of the submitting account.
  pub submitted_by: String,
  /// The calendar date future-dated records are checked against.
  pub today:        NaiveDate,
}

/// The caller-facing summary of an accepted upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
  pub upload_id: Uuid,
  pub summary:   ParseSummary,
  #[serde(flatten)]
  pub reconcile: ReconcileSummary,
}

#[derive(Debug, Clone)]
pub enum IngestOutcome {
  /// Nothing in the file parsed; no upload was recorded.
  NoValidRecords(ParseSummary),
  Ingested {
    upload: UploadRecord,
    report: IngestReport,
  },
}

/// Parse `request.raw` and apply it to `store` as a new upload.
///
/// Processing is a single synchronous pass; concurrent uploads touching the
/// same pairs are settled by whichever upsert commits last.
pub async fn ingest<S>(
  store: &S,
  parser: &Parser,
  request: IngestRequest<'_>,
) -> Result<IngestOutcome, S::Error>
where
  S: AttendanceStore,
{
  let parsed = parser.parse(request.raw, request.today);
  let summary = parsed.summary.clone();

  if summary.max_lines_applied {
    tracing::warn!(
      file_name = %request.file_name,
      max_lines = parser.config().max_lines,
      "biometric file truncated at line cap"
    );
  }

  if summary.invalid_lines > 0 {
    let reasons = summary.invalid_by_reason;
    tracing::debug!(
      file_name = %request.file_name,
      too_few_fields = reasons.too_few_fields,
      bad_reg_no = reasons.bad_reg_no,
      bad_date = reasons.bad_date,
      future_date = reasons.future_date,
      "invalid lines in biometric file"
    );
  }

  let Some(date_range) = summary.date_range else {
    return Ok(IngestOutcome::NoValidRecords(summary));
  };

  let upload = store
    .create_upload(NewUpload {
      upload_type: request.upload_type,
      file_name: request.file_name,
      date_range,
      total_lines: summary.total_lines,
      parsed_lines: summary.parsed_lines,
      invalid_lines: summary.invalid_lines,
      created_by: request.submitted_by,
    })
    .await?;

  let facts = parsed.into_facts();
  let reconciled = reconcile(store, &upload, &facts).await?;

  tracing::info!(
    upload_id = %upload.upload_id,
    upload_type = %upload.upload_type,
    parsed = summary.parsed_lines,
    invalid = summary.invalid_lines,
    matched = reconciled.matched_user_count,
    unknown = reconciled.unknown_reg_nos.len(),
    conflicts = reconciled.conflict_count,
    "biometric upload ingested"
  );

  let report = IngestReport {
    upload_id: upload.upload_id,
    summary,
    reconcile: reconciled,
  };
  Ok(IngestOutcome::Ingested { upload, report })
}
