//! The `AttendanceStore` trait: everything the core needs from persistence.
//!
//! Implemented by storage backends (e.g. `rollcall-store-sqlite`). The
//! reconciler and the HTTP layer depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  holiday::{Holiday, NewHoliday},
  record::{
    BulkWriteOutcome, ConflictQuery, ConflictRecord, DayAttendanceRecord,
    DayRecordWrite, NewConflict, NewUpload, RevertOutcome, UploadRecord,
  },
  user::{
    ActiveUser, NewUser, PromotionOutcome, SemesterClearOutcome, StudentFilter,
    User, UserCredentials, UserUpdate,
  },
};

/// Abstraction over a Rollcall storage backend.
///
/// Day records are upserted; conflicts and uploads are append-only apart
/// from the explicit admin operations (`resolve_conflict`,
/// `revert_latest_uploads`, `promote_semester`).
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait AttendanceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Reconciler collaborators ──────────────────────────────────────────

  /// Look up the active users holding any of `reg_nos`. Inactive users and
  /// unknown numbers are simply absent from the result.
  fn find_active_users_by_reg_no<'a>(
    &'a self,
    reg_nos: &'a [String],
  ) -> impl Future<Output = Result<Vec<ActiveUser>, Self::Error>> + Send + 'a;

  /// Fetch the existing day records for the given `(reg_no, date)` pairs.
  fn day_records_for<'a>(
    &'a self,
    pairs: &'a [(String, NaiveDate)],
  ) -> impl Future<Output = Result<Vec<DayAttendanceRecord>, Self::Error>> + Send + 'a;

  /// Upsert every row, marking it present and stamping it with the row's
  /// upload. Unordered: a failing row is counted in
  /// [`BulkWriteOutcome::failed`] and the rest still apply. Only a failure
  /// to reach the database at all is returned as `Err`.
  fn bulk_upsert_day_records(
    &self,
    writes: Vec<DayRecordWrite>,
  ) -> impl Future<Output = Result<BulkWriteOutcome, Self::Error>> + Send + '_;

  /// Append conflict records; returns the number stored. A conflict that is
  /// already on file for the same pair and uploads is not stored twice.
  fn insert_conflicts(
    &self,
    conflicts: Vec<NewConflict>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Persist a new upload record. `upload_id` and `created_at` are set by
  /// the store.
  fn create_upload(
    &self,
    input: NewUpload,
  ) -> impl Future<Output = Result<UploadRecord, Self::Error>> + Send + '_;

  // ── Uploads ───────────────────────────────────────────────────────────

  /// Most recent uploads first.
  fn list_uploads(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<UploadRecord>, Self::Error>> + Send + '_;

  fn latest_upload(
    &self,
  ) -> impl Future<Output = Result<Option<UploadRecord>, Self::Error>> + Send + '_;

  /// Undo the `count` most recent uploads: delete the day records they last
  /// wrote, the conflicts they raised, and the upload records themselves.
  fn revert_latest_uploads(
    &self,
    count: usize,
  ) -> impl Future<Output = Result<RevertOutcome, Self::Error>> + Send + '_;

  // ── Conflicts ─────────────────────────────────────────────────────────

  /// Newest first.
  fn list_conflicts<'a>(
    &'a self,
    query: &'a ConflictQuery,
  ) -> impl Future<Output = Result<Vec<ConflictRecord>, Self::Error>> + Send + 'a;

  /// Mark a conflict as reviewed. Returns `None` if it does not exist.
  fn resolve_conflict(
    &self,
    conflict_id: Uuid,
  ) -> impl Future<Output = Result<Option<ConflictRecord>, Self::Error>> + Send + '_;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Create a user. Returns `None` when the registration number is taken.
  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn get_user_by_reg_no<'a>(
    &'a self,
    reg_no: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Students matching every filter that is set, ordered by registration
  /// number.
  fn filter_students<'a>(
    &'a self,
    filter: &'a StudentFilter,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + 'a;

  /// Apply `update`; an existing `course_start_date` is never overwritten.
  /// Returns `None` if the user does not exist.
  fn update_user(
    &self,
    user_id: Uuid,
    update: UserUpdate,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Returns `None` if the user does not exist.
  fn set_user_active(
    &self,
    user_id: Uuid,
    active: bool,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Replace the stored password hash. Returns `None` if the user does not
  /// exist.
  fn set_password_hash(
    &self,
    user_id: Uuid,
    password_hash: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// The user holding `reg_no` with their password hash, active or not.
  fn credentials_by_reg_no<'a>(
    &'a self,
    reg_no: &'a str,
  ) -> impl Future<Output = Result<Option<UserCredentials>, Self::Error>> + Send + 'a;

  // ── Reports ───────────────────────────────────────────────────────────

  /// Day records for one student within `[from, to]`, oldest first.
  fn day_records_for_reg_no<'a>(
    &'a self,
    reg_no: &'a str,
    from: NaiveDate,
    to: NaiveDate,
  ) -> impl Future<Output = Result<Vec<DayAttendanceRecord>, Self::Error>> + Send + 'a;

  // ── Holidays ──────────────────────────────────────────────────────────

  /// Returns `None` when a holiday already exists on that date.
  fn add_holiday(
    &self,
    input: NewHoliday,
  ) -> impl Future<Output = Result<Option<Holiday>, Self::Error>> + Send + '_;

  /// Holidays within `[from, to]`, in date order.
  fn holidays_between(
    &self,
    from: NaiveDate,
    to: NaiveDate,
  ) -> impl Future<Output = Result<Vec<Holiday>, Self::Error>> + Send + '_;

  // ── Semesters ─────────────────────────────────────────────────────────

  /// Clear the day records of every active student in `semester` and move
  /// them on: semesters 1–7 are incremented, the final semester is
  /// deactivated. The caller validates `semester`.
  fn promote_semester(
    &self,
    semester: u8,
  ) -> impl Future<Output = Result<PromotionOutcome, Self::Error>> + Send + '_;

  /// Delete the day records of every active student in `semester` without
  /// changing the students themselves.
  fn clear_semester_attendance(
    &self,
    semester: u8,
  ) -> impl Future<Output = Result<SemesterClearOutcome, Self::Error>> + Send + '_;
}
