//! Parser tuning knobs, supplied by the caller at construction time.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Limits applied by [`crate::parse::Parser`] to every biometric export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
  /// Maximum number of physical lines examined per file. `0` disables the
  /// cap.
  #[serde(default = "default_max_lines")]
  pub max_lines:          usize,
  /// Exact digit count of a registration number.
  #[serde(default = "default_reg_no_digits")]
  pub reg_no_digits:      usize,
  /// Accept records dated after today (device clocks are often wrong, so
  /// this is off by default).
  #[serde(default)]
  pub allow_future_dates: bool,
}

fn default_max_lines() -> usize { 50_000 }

fn default_reg_no_digits() -> usize { 11 }

impl Default for IngestConfig {
  fn default() -> Self {
    Self {
      max_lines:          default_max_lines(),
      reg_no_digits:      default_reg_no_digits(),
      allow_future_dates: false,
    }
  }
}

impl IngestConfig {
  pub fn validate(&self) -> Result<()> {
    if self.reg_no_digits == 0 {
      return Err(Error::InvalidConfig(
        "reg_no_digits must be at least 1".into(),
      ));
    }
    Ok(())
  }

  /// The line cap, or `None` when unlimited.
  pub fn line_cap(&self) -> Option<usize> {
    (self.max_lines > 0).then_some(self.max_lines)
  }

  /// Whether `candidate` is exactly `reg_no_digits` ASCII digits.
  pub fn is_reg_no(&self, candidate: &str) -> bool {
    candidate.len() == self.reg_no_digits
      && candidate.bytes().all(|b| b.is_ascii_digit())
  }
}
