//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, calendar dates are `YYYY-MM-DD` (so they
//! sort and compare correctly as text), UUIDs are hyphenated lowercase, and
//! enums use their SCREAMING_SNAKE_CASE names.

use chrono::{DateTime, NaiveDate, Utc};
use rollcall_core::{
  holiday::Holiday,
  record::{ConflictRecord, DateRange, DayAttendanceRecord, UploadRecord, UploadType},
  user::{Role, User},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_count(column: &'static str, value: i64) -> Result<usize> {
  usize::try_from(value).map_err(|_| Error::OutOfRange { column, value })
}

fn decode_semester(value: i64) -> Result<u8> {
  u8::try_from(value).map_err(|_| Error::OutOfRange { column: "semester", value })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an `uploads` row.
pub struct RawUpload {
  pub upload_id:     String,
  pub upload_type:   String,
  pub file_name:     String,
  pub from_date:     String,
  pub to_date:       String,
  pub total_lines:   i64,
  pub parsed_lines:  i64,
  pub invalid_lines: i64,
  pub created_by:    String,
  pub created_at:    String,
}

pub const UPLOAD_COLUMNS: &str = "upload_id, upload_type, file_name, from_date, to_date,
   total_lines, parsed_lines, invalid_lines, created_by, created_at";

impl RawUpload {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      upload_id:     row.get(0)?,
      upload_type:   row.get(1)?,
      file_name:     row.get(2)?,
      from_date:     row.get(3)?,
      to_date:       row.get(4)?,
      total_lines:   row.get(5)?,
      parsed_lines:  row.get(6)?,
      invalid_lines: row.get(7)?,
      created_by:    row.get(8)?,
      created_at:    row.get(9)?,
    })
  }

  pub fn into_upload(self) -> Result<UploadRecord> {
    Ok(UploadRecord {
      upload_id:     decode_uuid(&self.upload_id)?,
      upload_type:   UploadType::parse(&self.upload_type)?,
      file_name:     self.file_name,
      date_range:    DateRange::new(
        decode_date(&self.from_date)?,
        decode_date(&self.to_date)?,
      )?,
      total_lines:   decode_count("total_lines", self.total_lines)?,
      parsed_lines:  decode_count("parsed_lines", self.parsed_lines)?,
      invalid_lines: decode_count("invalid_lines", self.invalid_lines)?,
      created_by:    self.created_by,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `day_attendance` row.
pub struct RawDayRecord {
  pub reg_no:           String,
  pub date:             String,
  pub present:          bool,
  pub last_upload_id:   String,
  pub last_upload_type: String,
  pub updated_at:       String,
}

pub const DAY_COLUMNS: &str =
  "reg_no, date, present, last_upload_id, last_upload_type, updated_at";

impl RawDayRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      reg_no:           row.get(0)?,
      date:             row.get(1)?,
      present:          row.get(2)?,
      last_upload_id:   row.get(3)?,
      last_upload_type: row.get(4)?,
      updated_at:       row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<DayAttendanceRecord> {
    Ok(DayAttendanceRecord {
      reg_no:           self.reg_no,
      date:             decode_date(&self.date)?,
      present:          self.present,
      last_upload_id:   decode_uuid(&self.last_upload_id)?,
      last_upload_type: UploadType::parse(&self.last_upload_type)?,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `conflicts` row.
pub struct RawConflict {
  pub conflict_id:        String,
  pub reg_no:             String,
  pub date:               String,
  pub previous_upload_id: String,
  pub new_upload_id:      String,
  pub resolved:           bool,
  pub created_at:         String,
}

pub const CONFLICT_COLUMNS: &str =
  "conflict_id, reg_no, date, previous_upload_id, new_upload_id, resolved, created_at";

impl RawConflict {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      conflict_id:        row.get(0)?,
      reg_no:             row.get(1)?,
      date:               row.get(2)?,
      previous_upload_id: row.get(3)?,
      new_upload_id:      row.get(4)?,
      resolved:           row.get(5)?,
      created_at:         row.get(6)?,
    })
  }

  pub fn into_conflict(self) -> Result<ConflictRecord> {
    Ok(ConflictRecord {
      conflict_id:        decode_uuid(&self.conflict_id)?,
      reg_no:             self.reg_no,
      date:               decode_date(&self.date)?,
      previous_upload_id: decode_uuid(&self.previous_upload_id)?,
      new_upload_id:      decode_uuid(&self.new_upload_id)?,
      resolved:           self.resolved,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub user_id:           String,
  pub name:              String,
  pub reg_no:            String,
  pub branch_code:       Option<String>,
  pub semester:          i64,
  pub course_start_date: Option<String>,
  pub course_end_date:   Option<String>,
  pub role:              String,
  pub is_active:         bool,
  pub created_at:        String,
  pub email:             Option<String>,
}

/// Excludes `password_hash`; the credentials lookup reads it as column 11.
pub const USER_COLUMNS: &str = "user_id, name, reg_no, branch_code, semester,
   course_start_date, course_end_date, role, is_active, created_at, email";

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:           row.get(0)?,
      name:              row.get(1)?,
      reg_no:            row.get(2)?,
      branch_code:       row.get(3)?,
      semester:          row.get(4)?,
      course_start_date: row.get(5)?,
      course_end_date:   row.get(6)?,
      role:              row.get(7)?,
      is_active:         row.get(8)?,
      created_at:        row.get(9)?,
      email:             row.get(10)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:           decode_uuid(&self.user_id)?,
      name:              self.name,
      reg_no:            self.reg_no,
      branch_code:       self.branch_code,
      semester:          decode_semester(self.semester)?,
      course_start_date: self.course_start_date.as_deref().map(decode_date).transpose()?,
      course_end_date:   self.course_end_date.as_deref().map(decode_date).transpose()?,
      role:              Role::parse(&self.role)?,
      is_active:         self.is_active,
      created_at:        decode_dt(&self.created_at)?,
      email:             self.email,
    })
  }
}

/// Raw values read directly from a `holidays` row.
pub struct RawHoliday {
  pub date:        String,
  pub description: String,
  pub created_at:  String,
}

impl RawHoliday {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      date:        row.get(0)?,
      description: row.get(1)?,
      created_at:  row.get(2)?,
    })
  }

  pub fn into_holiday(self) -> Result<Holiday> {
    Ok(Holiday {
      date:        decode_date(&self.date)?,
      description: self.description,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dates_are_zero_padded() {
    let d = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
    assert_eq!(encode_date(d), "2025-07-01");
    assert_eq!(decode_date("2025-07-01").unwrap(), d);
  }

  #[test]
  fn negative_counts_are_rejected() {
    assert!(matches!(
      decode_count("total_lines", -1),
      Err(Error::OutOfRange { column: "total_lines", value: -1 })
    ));
  }
}
