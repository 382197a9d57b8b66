//! Biometric device export parser.
//!
//! Input is a plain-text dump with one punch per line:
//!
//! ```text
//! 24102134037    2025-07-31 18:39:10    1   1   15  0
//! regNo          date[ time]            ...ignored...
//! ```
//!
//! Only the first two whitespace-separated columns matter. The parser is a
//! pure function of its input, its [`IngestConfig`] and the `today` date it
//! is handed; it never touches storage.
//!
//! Pipeline, per physical line:
//!   trim → blank? skip
//!        → header? skip (uncounted)
//!        → classify() → invalid (counted) | fact
//!             └─ dedup on (reg_no, date), first occurrence wins

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{IngestConfig, Result, record::DateRange};

// ─── Output types ────────────────────────────────────────────────────────────

/// "This student was seen on this day."
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttendanceFact {
  pub reg_no: String,
  pub date:   NaiveDate,
}

/// An accepted fact together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRecord {
  pub fact:        AttendanceFact,
  /// 1-based physical line number in the uploaded file.
  pub line_number: usize,
}

/// Counters for one [`Parser::parse`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseSummary {
  /// Non-blank, non-header lines examined.
  pub total_lines:       usize,
  /// Lines that produced a new fact.
  pub parsed_lines:      usize,
  /// Lines rejected for shape, registration number or date.
  pub invalid_lines:     usize,
  /// `invalid_lines` broken down by reason.
  pub invalid_by_reason: InvalidCounts,
  /// Distinct `(reg_no, date)` pairs emitted.
  pub unique_pairs:      usize,
  /// `true` when non-blank lines beyond the line cap were dropped.
  pub max_lines_applied: bool,
  /// Earliest and latest accepted date; `None` when nothing was accepted.
  pub date_range:        Option<DateRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOutput {
  pub records: Vec<ParsedRecord>,
  pub summary: ParseSummary,
}

impl ParseOutput {
  pub fn into_facts(self) -> Vec<AttendanceFact> {
    self.records.into_iter().map(|r| r.fact).collect()
  }
}

// ─── Line classification ─────────────────────────────────────────────────────

/// Why a line was counted as invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidLine {
  TooFewFields,
  BadRegNo,
  BadDate,
  FutureDate,
}

/// Invalid line counts per [`InvalidLine`] reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidCounts {
  pub too_few_fields: usize,
  pub bad_reg_no:     usize,
  pub bad_date:       usize,
  pub future_date:    usize,
}

impl InvalidCounts {
  fn record(&mut self, reason: InvalidLine) {
    match reason {
      InvalidLine::TooFewFields => self.too_few_fields += 1,
      InvalidLine::BadRegNo => self.bad_reg_no += 1,
      InvalidLine::BadDate => self.bad_date += 1,
      InvalidLine::FutureDate => self.future_date += 1,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Line {
  Header,
  Invalid(InvalidLine),
  Fact(AttendanceFact),
}

/// `true` if `s` is exactly `DDDD-DD-DD`.
fn has_iso_date_shape(s: &str) -> bool {
  let b = s.as_bytes();
  b.len() == 10
    && b.iter().enumerate().all(|(i, c)| match i {
      4 | 7 => *c == b'-',
      _ => c.is_ascii_digit(),
    })
}

/// Split on LF, CRLF or a lone CR. A trailing terminator does not yield an
/// extra empty line.
fn physical_lines(text: &str) -> Vec<&str> {
  let mut lines = Vec::new();
  let mut rest = text;
  while let Some(pos) = rest.find(['\n', '\r']) {
    lines.push(&rest[..pos]);
    let skip = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
    rest = &rest[pos + skip..];
  }
  if !rest.is_empty() {
    lines.push(rest);
  }
  lines
}

/// The date portion of a `date`, `dateTtime` or `date time` field.
fn date_part(field: &str) -> &str {
  field.split(['T', ' ']).next().unwrap_or(field)
}

// ─── Parser ──────────────────────────────────────────────────────────────────

/// Parses biometric exports under a fixed [`IngestConfig`].
#[derive(Debug, Clone)]
pub struct Parser {
  config: IngestConfig,
}

impl Parser {
  pub fn new(config: IngestConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self { config })
  }

  pub fn config(&self) -> &IngestConfig { &self.config }

  /// Parse `buffer`, rejecting records dated after `today` unless future
  /// dates are allowed.
  ///
  /// Lines end at LF, CRLF or a lone CR (older device exports use bare CR).
  /// Invalid UTF-8 is replaced rather than rejected; such lines then fail
  /// classification.
  pub fn parse(&self, buffer: &[u8], today: NaiveDate) -> ParseOutput {
    let text = String::from_utf8_lossy(buffer);
    let lines = physical_lines(&text);

    let (window, max_lines_applied) = match self.config.line_cap() {
      Some(cap) if lines.len() > cap => (
        &lines[..cap],
        lines[cap..].iter().any(|l| !l.trim().is_empty()),
      ),
      _ => (&lines[..], false),
    };

    let mut summary = ParseSummary { max_lines_applied, ..ParseSummary::default() };
    let mut records = Vec::new();
    let mut seen: HashSet<AttendanceFact> = HashSet::new();

    for (idx, raw) in window.iter().enumerate() {
      let line = raw.trim();
      if line.is_empty() {
        continue;
      }

      match self.classify(line, today) {
        Line::Header => {}
        Line::Invalid(reason) => {
          summary.total_lines += 1;
          summary.invalid_lines += 1;
          summary.invalid_by_reason.record(reason);
        }
        Line::Fact(fact) => {
          summary.total_lines += 1;
          // Repeat punches for the same day are dropped without counting.
          if seen.contains(&fact) {
            continue;
          }
          summary.parsed_lines += 1;
          summary.date_range = Some(match summary.date_range {
            Some(mut range) => {
              range.extend(fact.date);
              range
            }
            None => DateRange::day(fact.date),
          });
          seen.insert(fact.clone());
          records.push(ParsedRecord { fact, line_number: idx + 1 });
        }
      }
    }

    summary.unique_pairs = seen.len();
    ParseOutput { records, summary }
  }

  /// Classify one trimmed, non-blank line.
  ///
  /// A line that does not start with a digit is a header, unless its second
  /// column looks like a date: then it is a record with a malformed
  /// registration number.
  pub(crate) fn classify(&self, line: &str, today: NaiveDate) -> Line {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let starts_with_digit = line.starts_with(|c: char| c.is_ascii_digit());

    if !starts_with_digit {
      let looks_like_record = fields
        .get(1)
        .is_some_and(|f| has_iso_date_shape(date_part(f)));
      return if looks_like_record {
        Line::Invalid(InvalidLine::BadRegNo)
      } else {
        Line::Header
      };
    }

    let [reg_no, date_time, ..] = fields[..] else {
      return Line::Invalid(InvalidLine::TooFewFields);
    };

    if !self.config.is_reg_no(reg_no) {
      return Line::Invalid(InvalidLine::BadRegNo);
    }

    let date_str = date_part(date_time);
    if !has_iso_date_shape(date_str) {
      return Line::Invalid(InvalidLine::BadDate);
    }
    let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
      return Line::Invalid(InvalidLine::BadDate);
    };

    if !self.config.allow_future_dates && date > today {
      return Line::Invalid(InvalidLine::FutureDate);
    }

    Line::Fact(AttendanceFact { reg_no: reg_no.to_owned(), date })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(s: &str) -> NaiveDate { s.parse().unwrap() }

  fn today() -> NaiveDate { d("2025-08-01") }

  fn parser() -> Parser { Parser::new(IngestConfig::default()).unwrap() }

  fn parse(input: &str) -> ParseOutput { parser().parse(input.as_bytes(), today()) }

  // ── Example lines ───────────────────────────────────────────────────────

  #[test]
  fn device_line_yields_fact() {
    let out = parse("24102134037\t2025-07-31 18:39:10\t1\t1\t15\t0");
    assert_eq!(out.records.len(), 1);
    assert_eq!(
      out.records[0].fact,
      AttendanceFact { reg_no: "24102134037".into(), date: d("2025-07-31") }
    );
    assert_eq!(out.records[0].line_number, 1);
    assert_eq!(out.summary.parsed_lines, 1);
    assert_eq!(out.summary.invalid_lines, 0);
    assert_eq!(out.summary.unique_pairs, 1);
  }

  #[test]
  fn t_separated_datetime_is_accepted() {
    let out = parse("24102134037 2025-07-31T18:39:10");
    assert_eq!(out.records[0].fact.date, d("2025-07-31"));
  }

  #[test]
  fn non_digit_reg_no_before_a_date_is_invalid() {
    let out = parse("abc 2025-07-31");
    assert!(out.records.is_empty());
    assert_eq!(out.summary.invalid_lines, 1);
    assert_eq!(out.summary.total_lines, 1);
  }

  // ── Empty and header-only input ─────────────────────────────────────────

  #[test]
  fn empty_input_gives_zero_summary() {
    let out = parse("");
    assert!(out.records.is_empty());
    assert_eq!(out.summary, ParseSummary::default());
  }

  #[test]
  fn header_lines_are_not_counted() {
    let out = parse("RegNo DateTime Status\nDevice export v2\n\n   \n");
    assert!(out.records.is_empty());
    assert_eq!(out.summary.total_lines, 0);
    assert_eq!(out.summary.invalid_lines, 0);
    assert!(out.summary.date_range.is_none());
  }

  #[test]
  fn header_then_records() {
    let input = "No.\tDateTime\n24102134037\t2025-07-30 09:00:00\n24102134038\t2025-07-31 09:00:00\n";
    let out = parse(input);
    assert_eq!(out.summary.total_lines, 2);
    assert_eq!(out.summary.parsed_lines, 2);
    assert_eq!(out.records[0].line_number, 2);
    assert_eq!(out.records[1].line_number, 3);
  }

  // ── Invalid lines ───────────────────────────────────────────────────────

  #[test]
  fn single_field_line_is_invalid() {
    let out = parse("24102134037");
    assert_eq!(out.summary.invalid_lines, 1);
    assert!(out.records.is_empty());
  }

  #[test]
  fn wrong_length_reg_no_is_invalid() {
    let out = parse("2410213403 2025-07-31\n241021340370 2025-07-31");
    assert_eq!(out.summary.invalid_lines, 2);
  }

  #[test]
  fn malformed_dates_are_invalid() {
    let out = parse(
      "24102134037 31-07-2025\n24102134037 2025-7-31\n24102134037 2025-02-30\n24102134037 yesterday",
    );
    assert_eq!(out.summary.invalid_lines, 4);
    assert!(out.records.is_empty());
  }

  #[test]
  fn reg_no_length_is_configurable() {
    let cfg = IngestConfig { reg_no_digits: 6, ..IngestConfig::default() };
    let out = Parser::new(cfg).unwrap().parse(b"123456 2025-07-31\n24102134037 2025-07-31", today());
    assert_eq!(out.summary.parsed_lines, 1);
    assert_eq!(out.summary.invalid_lines, 1);
    assert_eq!(out.records[0].fact.reg_no, "123456");
  }

  // ── Future dates ────────────────────────────────────────────────────────

  #[test]
  fn tomorrow_is_rejected_by_default() {
    let out = parse("24102134037 2025-08-02 08:00:00");
    assert_eq!(out.summary.invalid_lines, 1);
    assert!(out.records.is_empty());
  }

  #[test]
  fn today_is_accepted() {
    let out = parse("24102134037 2025-08-01 08:00:00");
    assert_eq!(out.summary.parsed_lines, 1);
  }

  #[test]
  fn tomorrow_is_accepted_when_allowed() {
    let cfg = IngestConfig { allow_future_dates: true, ..IngestConfig::default() };
    let out = Parser::new(cfg)
      .unwrap()
      .parse(b"24102134037 2025-08-02 08:00:00", today());
    assert_eq!(out.summary.parsed_lines, 1);
    assert_eq!(out.summary.invalid_lines, 0);
  }

  // ── Dedup and ranges ────────────────────────────────────────────────────

  #[test]
  fn same_pair_twice_yields_one_fact() {
    let input = "24102134037 2025-07-31 08:00:00\n24102134037 2025-07-31 17:30:00\n";
    let out = parse(input);
    assert_eq!(out.records.len(), 1);
    assert_eq!(out.records[0].line_number, 1);
    assert_eq!(out.summary.total_lines, 2);
    assert_eq!(out.summary.parsed_lines, 1);
    assert_eq!(out.summary.invalid_lines, 0);
    assert_eq!(out.summary.unique_pairs, 1);
  }

  #[test]
  fn date_range_tracks_min_and_max() {
    let input = "24102134037 2025-07-15\n24102134038 2025-07-02\n24102134037 2025-07-29\n";
    let out = parse(input);
    assert_eq!(
      out.summary.date_range,
      Some(DateRange { from: d("2025-07-02"), to: d("2025-07-29") })
    );
  }

  #[test]
  fn crlf_and_lf_are_equivalent() {
    let lf = parse("24102134037 2025-07-30\n24102134038 2025-07-31\n");
    let crlf = parse("24102134037 2025-07-30\r\n24102134038 2025-07-31\r\n");
    assert_eq!(lf, crlf);
  }

  #[test]
  fn lone_cr_separates_lines() {
    let out = parse("24102134037 2025-07-30\r24102134038 2025-07-31\r");
    assert_eq!(out.summary.total_lines, 2);
    assert_eq!(out.summary.parsed_lines, 2);
    assert_eq!(out.records[1].line_number, 2);
  }

  #[test]
  fn mixed_terminators() {
    let out = parse("hdr\r\n24102134037 2025-07-30\r\r24102134038 2025-07-31\n");
    assert_eq!(out.summary.parsed_lines, 2);
    assert_eq!(out.records[1].line_number, 4);
  }

  #[test]
  fn parsing_is_deterministic() {
    let input = "hdr\n24102134037 2025-07-30\nbad\n24102134038 2025-07-31\n24102134037 2025-07-30\n";
    assert_eq!(parse(input), parse(input));
  }

  // ── Line cap ────────────────────────────────────────────────────────────

  #[test]
  fn lines_past_the_cap_are_dropped() {
    let cfg = IngestConfig { max_lines: 3, ..IngestConfig::default() };
    let input = (0..5)
      .map(|i| format!("2410213403{i} 2025-07-31"))
      .collect::<Vec<_>>()
      .join("\n");
    let out = Parser::new(cfg).unwrap().parse(input.as_bytes(), today());
    assert!(out.summary.max_lines_applied);
    assert_eq!(out.summary.total_lines, 3);
    assert_eq!(out.records.len(), 3);
    assert_eq!(out.records.last().unwrap().fact.reg_no, "24102134032");
  }

  #[test]
  fn cap_not_applied_when_only_blank_lines_follow() {
    let cfg = IngestConfig { max_lines: 2, ..IngestConfig::default() };
    let out = Parser::new(cfg)
      .unwrap()
      .parse(b"24102134037 2025-07-30\n24102134038 2025-07-31\n\n  \n", today());
    assert!(!out.summary.max_lines_applied);
    assert_eq!(out.summary.parsed_lines, 2);
  }

  #[test]
  fn counts_never_exceed_total_or_cap() {
    let cfg = IngestConfig { max_lines: 6, ..IngestConfig::default() };
    let input = "header\n24102134037 2025-07-30\nnope\n1 2\n24102134037 2025-07-30\n24102134038 2025-09-30\n24102134039 2025-07-01\n";
    let out = Parser::new(cfg).unwrap().parse(input.as_bytes(), today());
    let s = &out.summary;
    assert!(s.parsed_lines + s.invalid_lines <= s.total_lines);
    assert!(s.total_lines <= 6);
    assert!(s.max_lines_applied);
  }

  #[test]
  fn invalid_utf8_does_not_panic() {
    let mut input = b"24102134037 2025-07-31\n".to_vec();
    input.extend_from_slice(&[0xff, 0xfe, b' ', b'x', b'\n']);
    let out = parser().parse(&input, today());
    assert_eq!(out.summary.parsed_lines, 1);
  }

  #[test]
  fn invalid_lines_are_counted_by_reason() {
    let input = "24102134037\n123 2025-07-31\nabc 2025-07-31\n24102134037 2025/07/31\n24102134037 2025-02-30\n24102134037 2030-01-01\n24102134037 2025-07-31\n";
    let out = parse(input);
    assert_eq!(out.summary.invalid_lines, 6);
    assert_eq!(out.summary.invalid_by_reason, InvalidCounts {
      too_few_fields: 1,
      bad_reg_no:     2,
      bad_date:       2,
      future_date:    1,
    });
    assert_eq!(out.summary.parsed_lines, 1);
  }

  #[test]
  fn classify_reports_reason() {
    let p = parser();
    assert_eq!(p.classify("24102134037", today()), Line::Invalid(InvalidLine::TooFewFields));
    assert_eq!(p.classify("123 2025-07-31", today()), Line::Invalid(InvalidLine::BadRegNo));
    assert_eq!(p.classify("24102134037 2025/07/31", today()), Line::Invalid(InvalidLine::BadDate));
    assert_eq!(p.classify("24102134037 2030-01-01", today()), Line::Invalid(InvalidLine::FutureDate));
    assert_eq!(p.classify("Name Date", today()), Line::Header);
  }
}
