//! Error types for `rollcall-core`.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid ingest configuration: {0}")]
  InvalidConfig(String),

  #[error("invalid registration number: {0:?}")]
  InvalidRegNo(String),

  #[error("semester must be between 1 and 8, got {0}")]
  InvalidSemester(u8),

  #[error("date range starts after it ends: {from} > {to}")]
  InvalidDateRange { from: NaiveDate, to: NaiveDate },

  #[error("course start date is not set for {0}")]
  MissingCourseStart(String),

  #[error("unknown upload type: {0:?}")]
  UnknownUploadType(String),

  #[error("unknown role: {0:?}")]
  UnknownRole(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
