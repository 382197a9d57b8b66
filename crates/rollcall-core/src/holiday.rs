//! Institution holidays, excluded from the working-day count in reports.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// At most one holiday exists per date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
  pub date:        NaiveDate,
  /// e.g. "Republic Day".
  pub description: String,
  pub created_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHoliday {
  pub date:        NaiveDate,
  pub description: String,
}
