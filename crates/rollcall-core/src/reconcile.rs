//! Folds parsed attendance facts into durable day records.
//!
//! Policy is "latest upload wins": a pair already written by a different
//! upload is overwritten and the disagreement is logged as a
//! [`ConflictRecord`](crate::record::ConflictRecord). Conflicts never block
//! the overwrite. Unknown registration numbers are reported, not raised.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  parse::AttendanceFact,
  record::{BulkWriteOutcome, DayRecordWrite, NewConflict, UploadRecord},
  store::AttendanceStore,
};

/// What a reconcile pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
  /// Distinct active users referenced by the batch.
  pub matched_user_count: usize,
  /// Registration numbers with no active user, sorted. Their facts are
  /// dropped.
  pub unknown_reg_nos:    Vec<String>,
  pub conflict_count:     usize,
  pub records_written:    usize,
  /// Rows the bulk upsert could not apply.
  pub failed_writes:      usize,
}

/// Apply `facts`, asserted by `upload`, to `store`.
///
/// Duplicate facts within the batch are collapsed. Running the same batch
/// again under the same upload confirms the records without logging any
/// conflict. Only storage failures are returned as errors.
pub async fn reconcile<S>(
  store: &S,
  upload: &UploadRecord,
  facts: &[AttendanceFact],
) -> Result<ReconcileSummary, S::Error>
where
  S: AttendanceStore,
{
  let reg_nos: Vec<String> = facts
    .iter()
    .map(|f| f.reg_no.clone())
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect();

  if reg_nos.is_empty() {
    return Ok(ReconcileSummary::default());
  }

  let users = store.find_active_users_by_reg_no(&reg_nos).await?;
  let known: HashSet<&str> = users.iter().map(|u| u.reg_no.as_str()).collect();

  let unknown_reg_nos: Vec<String> = reg_nos
    .iter()
    .filter(|r| !known.contains(r.as_str()))
    .cloned()
    .collect();

  let pairs: Vec<(String, NaiveDate)> = facts
    .iter()
    .filter(|f| known.contains(f.reg_no.as_str()))
    .map(|f| (f.reg_no.clone(), f.date))
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect();

  tracing::debug!(
    upload_id = %upload.upload_id,
    reg_nos = reg_nos.len(),
    matched = users.len(),
    pairs = pairs.len(),
    "resolved attendance batch"
  );

  let previous: HashMap<(String, NaiveDate), Uuid> = store
    .day_records_for(&pairs)
    .await?
    .into_iter()
    .map(|r| ((r.reg_no, r.date), r.last_upload_id))
    .collect();

  let mut conflicts = Vec::new();
  let mut writes = Vec::with_capacity(pairs.len());

  for (reg_no, date) in pairs {
    if let Some(&previous_upload_id) = previous.get(&(reg_no.clone(), date))
      && previous_upload_id != upload.upload_id
    {
      conflicts.push(NewConflict {
        reg_no: reg_no.clone(),
        date,
        previous_upload_id,
        new_upload_id: upload.upload_id,
      });
    }
    writes.push(DayRecordWrite {
      reg_no,
      date,
      upload_id: upload.upload_id,
      upload_type: upload.upload_type,
    });
  }

  let outcome = if writes.is_empty() {
    BulkWriteOutcome::default()
  } else {
    store.bulk_upsert_day_records(writes).await?
  };

  let conflict_count = if conflicts.is_empty() {
    0
  } else {
    store.insert_conflicts(conflicts).await?
  };

  if outcome.failed > 0 {
    tracing::warn!(
      upload_id = %upload.upload_id,
      failed = outcome.failed,
      "some day records could not be written"
    );
  }

  Ok(ReconcileSummary {
    matched_user_count: users.len(),
    unknown_reg_nos,
    conflict_count,
    records_written: outcome.written,
    failed_writes: outcome.failed,
  })
}
