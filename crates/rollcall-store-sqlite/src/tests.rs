//! Integration tests for `SqliteStore`, the reconciler and `ingest` against
//! an in-memory database.

use chrono::NaiveDate;
use rollcall_core::{
  IngestConfig,
  holiday::NewHoliday,
  ingest::{IngestOutcome, IngestRequest, ingest},
  parse::{AttendanceFact, Parser},
  reconcile::reconcile,
  record::{
    ConflictQuery, DateRange, DayRecordWrite, NewUpload, UploadRecord, UploadType,
  },
  store::AttendanceStore,
  user::{NewUser, Role, StudentFilter, User, UserUpdate},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn d(s: &str) -> NaiveDate { s.parse().unwrap() }

fn today() -> NaiveDate { d("2025-08-01") }

fn student(reg_no: &str, semester: u8) -> NewUser {
  NewUser {
    name: format!("Student {reg_no}"),
    reg_no: reg_no.into(),
    branch_code: Some("103".into()),
    semester,
    course_start_date: None,
    course_end_date: None,
    role: Role::Student,
    email: None,
  }
}

async fn add_student(s: &SqliteStore, reg_no: &str, semester: u8) -> User {
  s.add_user(student(reg_no, semester)).await.unwrap().expect("fresh reg_no")
}

fn new_upload(from: &str, to: &str) -> NewUpload {
  NewUpload {
    upload_type:   UploadType::Weekly,
    file_name:     "week.dat".into(),
    date_range:    DateRange::new(d(from), d(to)).unwrap(),
    total_lines:   1,
    parsed_lines:  1,
    invalid_lines: 0,
    created_by:    "admin".into(),
  }
}

async fn upload(s: &SqliteStore) -> UploadRecord {
  s.create_upload(new_upload("2025-07-01", "2025-07-31")).await.unwrap()
}

fn fact(reg_no: &str, date: &str) -> AttendanceFact {
  AttendanceFact { reg_no: reg_no.into(), date: d(date) }
}

async fn run_ingest(s: &SqliteStore, raw: &str, upload_type: UploadType) -> IngestOutcome {
  let parser = Parser::new(IngestConfig::default()).unwrap();
  ingest(
    s,
    &parser,
    IngestRequest {
      raw: raw.as_bytes(),
      file_name: "export.dat".into(),
      upload_type,
      submitted_by: "admin".into(),
      today: today(),
    },
  )
  .await
  .unwrap()
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_user() {
  let s = store().await;
  let user = add_student(&s, "24102134037", 3).await;
  assert!(user.is_active);

  let fetched = s.get_user(user.user_id).await.unwrap().unwrap();
  assert_eq!(fetched.reg_no, "24102134037");
  assert_eq!(fetched.semester, 3);
  assert_eq!(fetched.role, Role::Student);

  let by_reg = s.get_user_by_reg_no("24102134037").await.unwrap().unwrap();
  assert_eq!(by_reg.user_id, user.user_id);
}

#[tokio::test]
async fn duplicate_reg_no_returns_none() {
  let s = store().await;
  add_student(&s, "24102134037", 3).await;
  let again = s.add_user(student("24102134037", 5)).await.unwrap();
  assert!(again.is_none());
}

#[tokio::test]
async fn get_user_missing_returns_none() {
  let s = store().await;
  assert!(s.get_user(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn filter_students_by_semester_and_prefix() {
  let s = store().await;
  add_student(&s, "24102134037", 3).await;
  add_student(&s, "24102134038", 3).await;
  add_student(&s, "23104134001", 5).await;
  let mut admin = student("24102199999", 3);
  admin.role = Role::Admin;
  s.add_user(admin).await.unwrap();

  let sem3 = s
    .filter_students(&StudentFilter { semester: Some(3), reg_no_prefix: None })
    .await
    .unwrap();
  assert_eq!(sem3.len(), 2);
  assert!(sem3.iter().all(|u| u.role == Role::Student));

  let prefixed = s
    .filter_students(&StudentFilter { semester: None, reg_no_prefix: Some("23".into()) })
    .await
    .unwrap();
  assert_eq!(prefixed.len(), 1);
  assert_eq!(prefixed[0].reg_no, "23104134001");
}

#[tokio::test]
async fn update_user_keeps_existing_course_start() {
  let s = store().await;
  let mut input = student("24102134037", 3);
  input.course_start_date = Some(d("2024-08-01"));
  let user = s.add_user(input).await.unwrap().unwrap();

  let updated = s
    .update_user(
      user.user_id,
      UserUpdate {
        semester:          Some(4),
        course_start_date: Some(d("2025-01-01")),
        course_end_date:   Some(d("2028-06-30")),
      },
    )
    .await
    .unwrap()
    .unwrap();

  assert_eq!(updated.semester, 4);
  assert_eq!(updated.course_start_date, Some(d("2024-08-01")));
  assert_eq!(updated.course_end_date, Some(d("2028-06-30")));
}

#[tokio::test]
async fn update_user_sets_missing_course_start() {
  let s = store().await;
  let user = add_student(&s, "24102134037", 3).await;
  let updated = s
    .update_user(
      user.user_id,
      UserUpdate { course_start_date: Some(d("2025-01-01")), ..UserUpdate::default() },
    )
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.course_start_date, Some(d("2025-01-01")));
  assert_eq!(updated.semester, 3);
}

#[tokio::test]
async fn update_missing_user_returns_none() {
  let s = store().await;
  let r = s.update_user(Uuid::new_v4(), UserUpdate::default()).await.unwrap();
  assert!(r.is_none());
}

#[tokio::test]
async fn inactive_users_are_not_in_directory() {
  let s = store().await;
  let a = add_student(&s, "24102134037", 3).await;
  add_student(&s, "24102134038", 3).await;
  s.set_user_active(a.user_id, false).await.unwrap().unwrap();

  let found = s
    .find_active_users_by_reg_no(&[
      "24102134037".into(),
      "24102134038".into(),
      "99999999999".into(),
    ])
    .await
    .unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].reg_no, "24102134038");
}

// ─── Credentials ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn credentials_start_without_a_password() {
  let s = store().await;
  let mut input = student("24102134037", 3);
  input.email = Some("s37@college.test".into());
  let user = s.add_user(input).await.unwrap().unwrap();
  assert_eq!(user.email.as_deref(), Some("s37@college.test"));

  let creds = s.credentials_by_reg_no("24102134037").await.unwrap().unwrap();
  assert_eq!(creds.user.user_id, user.user_id);
  assert_eq!(creds.user.email, user.email);
  assert!(creds.password_hash.is_none());
}

#[tokio::test]
async fn password_hash_is_stored_and_read_back() {
  let s = store().await;
  let user = add_student(&s, "24102134037", 3).await;

  let updated = s
    .set_password_hash(user.user_id, "$argon2id$stub".into())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.user_id, user.user_id);

  let creds = s.credentials_by_reg_no("24102134037").await.unwrap().unwrap();
  assert_eq!(creds.password_hash.as_deref(), Some("$argon2id$stub"));
}

#[tokio::test]
async fn credentials_include_inactive_users() {
  let s = store().await;
  let user = add_student(&s, "24102134037", 3).await;
  s.set_user_active(user.user_id, false).await.unwrap();

  let creds = s.credentials_by_reg_no("24102134037").await.unwrap().unwrap();
  assert!(!creds.user.is_active);
}

#[tokio::test]
async fn password_for_missing_user_is_none() {
  let s = store().await;
  assert!(s.set_password_hash(Uuid::new_v4(), "x".into()).await.unwrap().is_none());
  assert!(s.credentials_by_reg_no("24102134037").await.unwrap().is_none());
}

// ─── Bulk writes ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn bulk_upsert_tolerates_bad_rows() {
  let s = store().await;
  let up = upload(&s).await;

  let good = DayRecordWrite {
    reg_no:      "24102134037".into(),
    date:        d("2025-07-30"),
    upload_id:   up.upload_id,
    upload_type: UploadType::Weekly,
  };
  // Unknown upload id violates the foreign key.
  let bad = DayRecordWrite { upload_id: Uuid::new_v4(), date: d("2025-07-31"), ..good.clone() };

  let outcome = s.bulk_upsert_day_records(vec![bad, good]).await.unwrap();
  assert_eq!(outcome.written, 1);
  assert_eq!(outcome.failed, 1);

  let records = s
    .day_records_for(&[
      ("24102134037".into(), d("2025-07-30")),
      ("24102134037".into(), d("2025-07-31")),
    ])
    .await
    .unwrap();
  assert_eq!(records.len(), 1);
  assert!(records[0].present);
  assert_eq!(records[0].last_upload_id, up.upload_id);
}

#[tokio::test]
async fn duplicate_conflicts_are_stored_once() {
  let s = store().await;
  let first = upload(&s).await;
  let second = upload(&s).await;
  let conflict = rollcall_core::record::NewConflict {
    reg_no:             "24102134037".into(),
    date:               d("2025-07-30"),
    previous_upload_id: first.upload_id,
    new_upload_id:      second.upload_id,
  };
  assert_eq!(s.insert_conflicts(vec![conflict.clone()]).await.unwrap(), 1);
  assert_eq!(s.insert_conflicts(vec![conflict]).await.unwrap(), 0);
}

// ─── Reconciler ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn reconcile_creates_records_and_reports_unknowns() {
  let s = store().await;
  add_student(&s, "24102134037", 3).await;
  add_student(&s, "24102134038", 3).await;
  let up = upload(&s).await;

  let facts = vec![
    fact("24102134037", "2025-07-30"),
    fact("24102134037", "2025-07-31"),
    fact("24102134038", "2025-07-31"),
    fact("11111111111", "2025-07-31"),
  ];
  let summary = reconcile(&s, &up, &facts).await.unwrap();

  assert_eq!(summary.matched_user_count, 2);
  assert_eq!(summary.unknown_reg_nos, vec!["11111111111".to_string()]);
  assert_eq!(summary.conflict_count, 0);
  assert_eq!(summary.records_written, 3);
  assert_eq!(summary.failed_writes, 0);

  let unknown = s
    .day_records_for(&[("11111111111".into(), d("2025-07-31"))])
    .await
    .unwrap();
  assert!(unknown.is_empty());
}

#[tokio::test]
async fn reconcile_same_upload_twice_logs_no_conflict() {
  let s = store().await;
  add_student(&s, "24102134037", 3).await;
  let up = upload(&s).await;
  let facts = vec![fact("24102134037", "2025-07-30")];

  reconcile(&s, &up, &facts).await.unwrap();
  let again = reconcile(&s, &up, &facts).await.unwrap();

  assert_eq!(again.conflict_count, 0);
  assert_eq!(again.records_written, 1);
  let conflicts = s.list_conflicts(&ConflictQuery::default()).await.unwrap();
  assert!(conflicts.is_empty());
}

#[tokio::test]
async fn later_upload_wins_and_logs_one_conflict() {
  let s = store().await;
  add_student(&s, "24102134037", 3).await;
  let first = upload(&s).await;
  let second = upload(&s).await;
  let facts = vec![fact("24102134037", "2025-07-30")];

  reconcile(&s, &first, &facts).await.unwrap();
  let summary = reconcile(&s, &second, &facts).await.unwrap();
  assert_eq!(summary.conflict_count, 1);

  let records = s
    .day_records_for(&[("24102134037".into(), d("2025-07-30"))])
    .await
    .unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].last_upload_id, second.upload_id);

  let conflicts = s.list_conflicts(&ConflictQuery::default()).await.unwrap();
  assert_eq!(conflicts.len(), 1);
  assert_eq!(conflicts[0].previous_upload_id, first.upload_id);
  assert_eq!(conflicts[0].new_upload_id, second.upload_id);
  assert!(!conflicts[0].resolved);
}

#[tokio::test]
async fn duplicate_facts_in_batch_are_collapsed() {
  let s = store().await;
  add_student(&s, "24102134037", 3).await;
  let first = upload(&s).await;
  let second = upload(&s).await;
  reconcile(&s, &first, &[fact("24102134037", "2025-07-30")]).await.unwrap();

  let dupes = vec![fact("24102134037", "2025-07-30"), fact("24102134037", "2025-07-30")];
  let summary = reconcile(&s, &second, &dupes).await.unwrap();
  assert_eq!(summary.conflict_count, 1);
  assert_eq!(summary.records_written, 1);
}

#[tokio::test]
async fn empty_batch_touches_nothing() {
  let s = store().await;
  let up = upload(&s).await;
  let summary = reconcile(&s, &up, &[]).await.unwrap();
  assert_eq!(summary, Default::default());
}

// ─── Ingest ──────────────────────────────────────────────────────────────────

const EXPORT: &str = "No.\tDateTime\tA\tB\tC\tD
24102134037\t2025-07-31 18:39:10\t1\t1\t15\t0
24102134037\t2025-07-31 09:02:44\t1\t1\t15\t0
24102134038\t2025-07-30 09:10:00\t1\t1\t15\t0
99999999999\t2025-07-30 09:11:00\t1\t1\t15\t0
abc 2025-07-31
24102134038\t2025-08-05 09:10:00\t1\t1\t15\t0
";

#[tokio::test]
async fn ingest_parses_records_and_reconciles() {
  let s = store().await;
  add_student(&s, "24102134037", 3).await;
  add_student(&s, "24102134038", 3).await;

  let IngestOutcome::Ingested { upload, report } =
    run_ingest(&s, EXPORT, UploadType::Monthly).await
  else {
    panic!("expected an accepted upload");
  };

  assert_eq!(report.summary.parsed_lines, 3);
  assert_eq!(report.summary.invalid_lines, 2);
  assert_eq!(report.summary.total_lines, 6);
  assert_eq!(report.reconcile.matched_user_count, 2);
  assert_eq!(report.reconcile.unknown_reg_nos, vec!["99999999999".to_string()]);
  assert_eq!(report.reconcile.conflict_count, 0);

  assert_eq!(upload.upload_type, UploadType::Monthly);
  assert_eq!(upload.date_range, DateRange::new(d("2025-07-30"), d("2025-07-31")).unwrap());
  assert_eq!(upload.parsed_lines, 3);
  assert_eq!(upload.created_by, "admin");

  let latest = s.latest_upload().await.unwrap().unwrap();
  assert_eq!(latest.upload_id, upload.upload_id);

  let records = s
    .day_records_for_reg_no("24102134037", d("2025-07-01"), d("2025-07-31"))
    .await
    .unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].last_upload_type, UploadType::Monthly);
}

#[tokio::test]
async fn ingest_without_valid_records_creates_no_upload() {
  let s = store().await;
  let outcome = run_ingest(&s, "header only\nabc 2025-07-31\n", UploadType::Weekly).await;
  let IngestOutcome::NoValidRecords(summary) = outcome else {
    panic!("expected rejection");
  };
  assert_eq!(summary.invalid_lines, 1);
  assert!(s.latest_upload().await.unwrap().is_none());
}

#[tokio::test]
async fn two_ingests_of_same_file_conflict_once_per_pair() {
  let s = store().await;
  add_student(&s, "24102134037", 3).await;
  let raw = "24102134037 2025-07-31 18:39:10\n";

  let IngestOutcome::Ingested { report: first, .. } =
    run_ingest(&s, raw, UploadType::Weekly).await
  else {
    panic!("first upload rejected");
  };
  let IngestOutcome::Ingested { report: second, .. } =
    run_ingest(&s, raw, UploadType::Monthly).await
  else {
    panic!("second upload rejected");
  };

  assert_eq!(first.reconcile.conflict_count, 0);
  assert_eq!(second.reconcile.conflict_count, 1);

  let records = s
    .day_records_for(&[("24102134037".into(), d("2025-07-31"))])
    .await
    .unwrap();
  assert_eq!(records[0].last_upload_id, second.upload_id);
  assert_eq!(records[0].last_upload_type, UploadType::Monthly);
}

// ─── Conflicts ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn resolve_conflict_marks_it_and_filters_apply() {
  let s = store().await;
  add_student(&s, "24102134037", 3).await;
  add_student(&s, "24102134038", 3).await;
  let first = upload(&s).await;
  let second = upload(&s).await;
  let facts = vec![fact("24102134037", "2025-07-30"), fact("24102134038", "2025-07-30")];
  reconcile(&s, &first, &facts).await.unwrap();
  reconcile(&s, &second, &facts).await.unwrap();

  let all = s.list_conflicts(&ConflictQuery::default()).await.unwrap();
  assert_eq!(all.len(), 2);

  let resolved = s.resolve_conflict(all[0].conflict_id).await.unwrap().unwrap();
  assert!(resolved.resolved);

  let open = s
    .list_conflicts(&ConflictQuery { unresolved_only: true, ..ConflictQuery::default() })
    .await
    .unwrap();
  assert_eq!(open.len(), 1);
  assert_ne!(open[0].conflict_id, all[0].conflict_id);

  let one = s
    .list_conflicts(&ConflictQuery {
      reg_no: Some("24102134038".into()),
      ..ConflictQuery::default()
    })
    .await
    .unwrap();
  assert_eq!(one.len(), 1);

  assert!(s.resolve_conflict(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Revert ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn revert_latest_upload_removes_its_records_and_conflicts() {
  let s = store().await;
  add_student(&s, "24102134037", 3).await;
  let first = upload(&s).await;
  let second = upload(&s).await;
  reconcile(&s, &first, &[fact("24102134037", "2025-07-29")]).await.unwrap();
  reconcile(
    &s,
    &second,
    &[fact("24102134037", "2025-07-29"), fact("24102134037", "2025-07-30")],
  )
  .await
  .unwrap();

  let outcome = s.revert_latest_uploads(1).await.unwrap();
  assert_eq!(outcome.uploads_reverted, 1);
  assert_eq!(outcome.day_records_deleted, 2);
  assert_eq!(outcome.conflicts_deleted, 1);

  let remaining = s.list_uploads(10).await.unwrap();
  assert_eq!(remaining.len(), 1);
  assert_eq!(remaining[0].upload_id, first.upload_id);
  assert!(s.list_conflicts(&ConflictQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn revert_with_no_uploads_is_a_no_op() {
  let s = store().await;
  let outcome = s.revert_latest_uploads(5).await.unwrap();
  assert_eq!(outcome, Default::default());
}

// ─── Holidays ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn holidays_are_unique_per_date() {
  let s = store().await;
  let h = NewHoliday { date: d("2025-08-15"), description: "Independence Day".into() };
  assert!(s.add_holiday(h.clone()).await.unwrap().is_some());
  assert!(s.add_holiday(h).await.unwrap().is_none());

  s.add_holiday(NewHoliday { date: d("2025-10-02"), description: "Gandhi Jayanti".into() })
    .await
    .unwrap();

  let aug = s.holidays_between(d("2025-08-01"), d("2025-08-31")).await.unwrap();
  assert_eq!(aug.len(), 1);
  assert_eq!(aug[0].description, "Independence Day");
}

// ─── Semester promotion ──────────────────────────────────────────────────────

#[tokio::test]
async fn promotion_clears_records_and_increments_semester() {
  let s = store().await;
  let a = add_student(&s, "24102134037", 3).await;
  let b = add_student(&s, "24102134038", 4).await;
  let up = upload(&s).await;
  reconcile(
    &s,
    &up,
    &[fact("24102134037", "2025-07-30"), fact("24102134038", "2025-07-30")],
  )
  .await
  .unwrap();

  let outcome = s.promote_semester(3).await.unwrap();
  assert_eq!(outcome.students, 1);
  assert_eq!(outcome.day_records_deleted, 1);
  assert!(!outcome.graduated);

  assert_eq!(s.get_user(a.user_id).await.unwrap().unwrap().semester, 4);
  assert_eq!(s.get_user(b.user_id).await.unwrap().unwrap().semester, 4);
  let kept = s
    .day_records_for(&[("24102134038".into(), d("2025-07-30"))])
    .await
    .unwrap();
  assert_eq!(kept.len(), 1);
}

#[tokio::test]
async fn final_semester_students_are_deactivated() {
  let s = store().await;
  let a = add_student(&s, "24102134037", 8).await;
  let outcome = s.promote_semester(8).await.unwrap();
  assert!(outcome.graduated);
  assert_eq!(outcome.students, 1);

  let user = s.get_user(a.user_id).await.unwrap().unwrap();
  assert!(!user.is_active);
  assert_eq!(user.semester, 8);
}

#[tokio::test]
async fn promoting_empty_semester_reports_zero() {
  let s = store().await;
  let outcome = s.promote_semester(2).await.unwrap();
  assert_eq!(outcome.students, 0);
}

#[tokio::test]
async fn clearing_a_semester_keeps_students_in_place() {
  let s = store().await;
  let a = add_student(&s, "24102134037", 3).await;
  add_student(&s, "24102134038", 4).await;
  let up = upload(&s).await;
  reconcile(
    &s,
    &up,
    &[
      fact("24102134037", "2025-07-29"),
      fact("24102134037", "2025-07-30"),
      fact("24102134038", "2025-07-30"),
    ],
  )
  .await
  .unwrap();

  let outcome = s.clear_semester_attendance(3).await.unwrap();
  assert_eq!(outcome.semester, 3);
  assert_eq!(outcome.day_records_deleted, 2);

  let user = s.get_user(a.user_id).await.unwrap().unwrap();
  assert_eq!(user.semester, 3);
  assert!(user.is_active);

  let left = s
    .day_records_for(&[
      ("24102134037".into(), d("2025-07-30")),
      ("24102134038".into(), d("2025-07-30")),
    ])
    .await
    .unwrap();
  assert_eq!(left.len(), 1);
  assert_eq!(left[0].reg_no, "24102134038");
}

#[tokio::test]
async fn clearing_an_empty_semester_deletes_nothing() {
  let s = store().await;
  add_student(&s, "24102134037", 3).await;
  let outcome = s.clear_semester_attendance(5).await.unwrap();
  assert_eq!(outcome.day_records_deleted, 0);
}
