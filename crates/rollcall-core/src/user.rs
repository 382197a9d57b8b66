//! Users as seen by the attendance core.
//!
//! The registration number is the join key against biometric logs. A
//! password hash is kept by the store but never travels on [`User`]; it is
//! only read back through [`UserCredentials`] at login.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, IngestConfig, Result};

/// Highest semester a student can be enrolled in.
pub const FINAL_SEMESTER: u8 = 8;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
  #[default]
  Student,
  Admin,
  Teacher,
  Hod,
  Feedback,
  Developer,
}

impl Role {
  pub fn as_str(self) -> &'static str { self.into() }

  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownRole(s.to_owned()))
  }

  /// Every role except [`Role::Student`] belongs to the staff group.
  pub fn is_staff(self) -> bool { self != Role::Student }

  /// Roles allowed on the admin surface with a login session.
  pub fn can_administer(self) -> bool {
    matches!(self, Role::Admin | Role::Developer)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id:           Uuid,
  pub name:              String,
  pub reg_no:            String,
  /// e.g. "103", "104".
  pub branch_code:       Option<String>,
  pub semester:          u8,
  pub course_start_date: Option<NaiveDate>,
  pub course_end_date:   Option<NaiveDate>,
  pub role:              Role,
  /// Inactive users (graduated, blocked) are invisible to the reconciler.
  pub is_active:         bool,
  pub created_at:        DateTime<Utc>,
  /// Where login codes are delivered.
  pub email:             Option<String>,
}

/// A user together with the stored password hash, for login only.
#[derive(Debug, Clone)]
pub struct UserCredentials {
  pub user:          User,
  /// argon2 PHC string; `None` until an admin sets a password.
  pub password_hash: Option<String>,
}

/// The projection returned by the active-user directory lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveUser {
  pub user_id: Uuid,
  pub reg_no:  String,
}

/// Input to [`crate::store::AttendanceStore::add_user`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
  pub name:              String,
  pub reg_no:            String,
  #[serde(default)]
  pub branch_code:       Option<String>,
  pub semester:          u8,
  #[serde(default)]
  pub course_start_date: Option<NaiveDate>,
  #[serde(default)]
  pub course_end_date:   Option<NaiveDate>,
  #[serde(default)]
  pub role:              Role,
  #[serde(default)]
  pub email:             Option<String>,
}

impl NewUser {
  /// Check the registration number against `config` and the semester
  /// against `1..=8`.
  pub fn validate(&self, config: &IngestConfig) -> Result<()> {
    if !config.is_reg_no(&self.reg_no) {
      return Err(Error::InvalidRegNo(self.reg_no.clone()));
    }
    validate_semester(self.semester)?;
    if let (Some(from), Some(to)) = (self.course_start_date, self.course_end_date)
      && from > to
    {
      return Err(Error::InvalidDateRange { from, to });
    }
    Ok(())
  }
}

pub fn validate_semester(semester: u8) -> Result<()> {
  if !(1..=FINAL_SEMESTER).contains(&semester) {
    return Err(Error::InvalidSemester(semester));
  }
  Ok(())
}

/// Admin-side partial update. `course_start_date` is only applied when the
/// user does not already have one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
  pub semester:          Option<u8>,
  pub course_start_date: Option<NaiveDate>,
  pub course_end_date:   Option<NaiveDate>,
}

/// Filter for [`crate::store::AttendanceStore::filter_students`]. Only users
/// with [`Role::Student`] are ever returned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentFilter {
  pub semester:      Option<u8>,
  /// Registration numbers starting with this string.
  pub reg_no_prefix: Option<String>,
}

impl StudentFilter {
  pub fn is_empty(&self) -> bool {
    self.semester.is_none()
      && self.reg_no_prefix.as_deref().is_none_or(str::is_empty)
  }
}

/// Counts returned by [`crate::store::AttendanceStore::promote_semester`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionOutcome {
  pub semester:            u8,
  pub students:            usize,
  pub day_records_deleted: usize,
  /// `true` when the students were in the final semester and have been
  /// deactivated rather than promoted.
  pub graduated:           bool,
}

/// Counts returned by
/// [`crate::store::AttendanceStore::clear_semester_attendance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemesterClearOutcome {
  pub semester:            u8,
  pub day_records_deleted: usize,
}
