//! Persisted attendance records: uploads, per-day attendance and conflicts.
//!
//! An [`UploadRecord`] is written once per accepted file and never changes.
//! [`DayAttendanceRecord`]s are unique per `(reg_no, date)` and always point
//! at the last upload that asserted them. [`ConflictRecord`]s are
//! append-only; only their `resolved` flag is ever updated.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Upload type ─────────────────────────────────────────────────────────────

/// The cadence (or origin) of an attendance upload.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadType {
  #[default]
  Weekly,
  Monthly,
  Yearly,
  Manual,
}

impl UploadType {
  pub fn as_str(self) -> &'static str { self.into() }

  pub fn parse(s: &str) -> Result<Self> {
    s.parse()
      .map_err(|_| Error::UnknownUploadType(s.to_owned()))
  }
}

// ─── Date range ──────────────────────────────────────────────────────────────

/// An inclusive calendar-date interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
  pub from: NaiveDate,
  pub to:   NaiveDate,
}

impl DateRange {
  pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
    if from > to {
      return Err(Error::InvalidDateRange { from, to });
    }
    Ok(Self { from, to })
  }

  /// A range covering a single day.
  pub fn day(date: NaiveDate) -> Self { Self { from: date, to: date } }

  /// Widen the range so it also covers `date`.
  pub fn extend(&mut self, date: NaiveDate) {
    if date < self.from {
      self.from = date;
    }
    if date > self.to {
      self.to = date;
    }
  }

  pub fn contains(&self, date: NaiveDate) -> bool {
    self.from <= date && date <= self.to
  }

  /// Number of calendar days covered, counting both ends.
  pub fn days(&self) -> i64 { (self.to - self.from).num_days() + 1 }
}

// ─── Uploads ─────────────────────────────────────────────────────────────────

/// Metadata for one ingestion event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecord {
  pub upload_id:     Uuid,
  pub upload_type:   UploadType,
  pub file_name:     String,
  /// Earliest and latest accepted date in the file.
  pub date_range:    DateRange,
  pub total_lines:   usize,
  pub parsed_lines:  usize,
  pub invalid_lines: usize,
  /// Identity of the account that submitted the file.
  pub created_by:    String,
  /// Server-assigned.
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::AttendanceStore::create_upload`].
#[derive(Debug, Clone)]
pub struct NewUpload {
  pub upload_type:   UploadType,
  pub file_name:     String,
  pub date_range:    DateRange,
  pub total_lines:   usize,
  pub parsed_lines:  usize,
  pub invalid_lines: usize,
  pub created_by:    String,
}

/// Counts returned by [`crate::store::AttendanceStore::revert_latest_uploads`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertOutcome {
  pub uploads_reverted:    usize,
  pub day_records_deleted: usize,
  pub conflicts_deleted:   usize,
}

// ─── Day attendance ──────────────────────────────────────────────────────────

/// The durable "was present on this day" fact for one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAttendanceRecord {
  pub reg_no:           String,
  pub date:             NaiveDate,
  /// Always `true` once the record exists.
  pub present:          bool,
  pub last_upload_id:   Uuid,
  pub last_upload_type: UploadType,
  pub updated_at:       DateTime<Utc>,
}

/// One row of a bulk upsert into the day-attendance table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayRecordWrite {
  pub reg_no:      String,
  pub date:        NaiveDate,
  pub upload_id:   Uuid,
  pub upload_type: UploadType,
}

/// Result of an unordered bulk upsert: rows that failed are skipped, not
/// fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkWriteOutcome {
  pub written: usize,
  pub failed:  usize,
}

// ─── Conflicts ───────────────────────────────────────────────────────────────

/// Two different uploads asserted the same `(reg_no, date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
  pub conflict_id:        Uuid,
  pub reg_no:             String,
  pub date:               NaiveDate,
  pub previous_upload_id: Uuid,
  pub new_upload_id:      Uuid,
  pub resolved:           bool,
  pub created_at:         DateTime<Utc>,
}

/// Input to [`crate::store::AttendanceStore::insert_conflicts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConflict {
  pub reg_no:             String,
  pub date:               NaiveDate,
  pub previous_upload_id: Uuid,
  pub new_upload_id:      Uuid,
}

/// Filter for [`crate::store::AttendanceStore::list_conflicts`].
#[derive(Debug, Clone, Default)]
pub struct ConflictQuery {
  pub unresolved_only: bool,
  pub reg_no:          Option<String>,
  pub limit:           Option<usize>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(s: &str) -> NaiveDate { s.parse().unwrap() }

  #[test]
  fn upload_type_uses_screaming_names() {
    assert_eq!(UploadType::Monthly.to_string(), "MONTHLY");
    assert_eq!(UploadType::parse("YEARLY").unwrap(), UploadType::Yearly);
    assert!(matches!(
      UploadType::parse("BIOMETRIC"),
      Err(Error::UnknownUploadType(_))
    ));
    let json = serde_json::to_string(&UploadType::Manual).unwrap();
    assert_eq!(json, "\"MANUAL\"");
  }

  #[test]
  fn date_range_rejects_inverted_bounds() {
    assert!(DateRange::new(d("2025-08-02"), d("2025-08-01")).is_err());
    let r = DateRange::new(d("2025-08-01"), d("2025-08-31")).unwrap();
    assert_eq!(r.days(), 31);
    assert!(r.contains(d("2025-08-15")));
    assert!(!r.contains(d("2025-09-01")));
  }

  #[test]
  fn extend_widens_both_ends() {
    let mut r = DateRange::day(d("2025-07-10"));
    r.extend(d("2025-07-31"));
    r.extend(d("2025-07-01"));
    r.extend(d("2025-07-15"));
    assert_eq!(r, DateRange { from: d("2025-07-01"), to: d("2025-07-31") });
  }
}
