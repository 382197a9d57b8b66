//! Per-student attendance report: presence against working days.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  holiday::Holiday,
  record::{DateRange, DayAttendanceRecord},
  user::User,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttendanceStats {
  pub present_days:       usize,
  /// Calendar days in range minus holidays in range. Weekends are not
  /// excluded.
  pub total_working_days: i64,
  /// Rounded to two decimal places; `0.0` when there are no working days.
  pub percentage:         f64,
}

impl AttendanceStats {
  pub fn compute(range: DateRange, present_days: usize, holidays: usize) -> Self {
    let total_working_days = range.days() - holidays as i64;
    let percentage = if total_working_days > 0 {
      let raw = present_days as f64 / total_working_days as f64 * 100.0;
      (raw * 100.0).round() / 100.0
    } else {
      0.0
    };
    Self { present_days, total_working_days, percentage }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceReport {
  pub reg_no:   String,
  pub range:    DateRange,
  pub records:  Vec<DayAttendanceRecord>,
  pub holidays: Vec<Holiday>,
  pub stats:    AttendanceStats,
}

impl AttendanceReport {
  pub fn new(
    reg_no: String,
    range: DateRange,
    records: Vec<DayAttendanceRecord>,
    holidays: Vec<Holiday>,
  ) -> Self {
    let stats = AttendanceStats::compute(range, records.len(), holidays.len());
    Self { reg_no, range, records, holidays, stats }
  }
}

/// Work out the report window for `user`.
///
/// `from` defaults to the course start date (which must then be set); `to`
/// defaults to the course end date, or `today` if there is none.
pub fn report_range(
  user: &User,
  from: Option<NaiveDate>,
  to: Option<NaiveDate>,
  today: NaiveDate,
) -> Result<DateRange> {
  let from = match from.or(user.course_start_date) {
    Some(d) => d,
    None => return Err(Error::MissingCourseStart(user.reg_no.clone())),
  };
  let to = to.or(user.course_end_date).unwrap_or(today);
  DateRange::new(from, to)
}
