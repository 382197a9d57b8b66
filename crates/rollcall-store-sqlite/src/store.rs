//! [`SqliteStore`]: the SQLite implementation of [`AttendanceStore`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use rollcall_core::{
  holiday::{Holiday, NewHoliday},
  record::{
    BulkWriteOutcome, ConflictQuery, ConflictRecord, DayAttendanceRecord,
    DayRecordWrite, NewConflict, NewUpload, RevertOutcome, UploadRecord,
  },
  store::AttendanceStore,
  user::{
    ActiveUser, FINAL_SEMESTER, NewUser, PromotionOutcome, Role, SemesterClearOutcome,
    StudentFilter, User, UserCredentials, UserUpdate,
  },
};

use crate::{
  Result,
  encode::{
    CONFLICT_COLUMNS, DAY_COLUMNS, RawConflict, RawDayRecord, RawHoliday,
    RawUpload, RawUser, UPLOAD_COLUMNS, USER_COLUMNS, decode_uuid, encode_date,
    encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Rollcall attendance store backed by a single SQLite file.
///
/// Cloning shares the inner connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch at most one user with `column = value`.
  async fn user_where(&self, column: &'static str, value: String) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![value], RawUser::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn conflict_by_id(&self, conflict_id: Uuid) -> Result<Option<ConflictRecord>> {
    let id_str = encode_uuid(conflict_id);

    let raw: Option<RawConflict> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CONFLICT_COLUMNS} FROM conflicts WHERE conflict_id = ?1"),
              rusqlite::params![id_str],
              RawConflict::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawConflict::into_conflict).transpose()
  }
}

/// Delete every day record held by an active student of `semester`.
fn delete_semester_day_records(
  conn: &rusqlite::Connection,
  semester: i64,
) -> rusqlite::Result<usize> {
  conn.execute(
    "DELETE FROM day_attendance WHERE reg_no IN (
       SELECT reg_no FROM users WHERE role = ?1 AND semester = ?2 AND is_active = 1
     )",
    rusqlite::params![Role::Student.as_str(), semester],
  )
}

// ─── AttendanceStore impl ────────────────────────────────────────────────────

impl AttendanceStore for SqliteStore {
  type Error = crate::Error;

  // ── Reconciler collaborators ──────────────────────────────────────────────

  async fn find_active_users_by_reg_no(&self, reg_nos: &[String]) -> Result<Vec<ActiveUser>> {
    let reg_nos = reg_nos.to_vec();

    let rows: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT user_id, reg_no FROM users WHERE reg_no = ?1 AND is_active = 1",
        )?;
        let mut found: Vec<(String, String)> = Vec::new();
        for reg_no in &reg_nos {
          let row = stmt
            .query_row(rusqlite::params![reg_no], |r| Ok((r.get(0)?, r.get(1)?)))
            .optional()?;
          found.extend(row);
        }
        Ok(found)
      })
      .await?;

    rows
      .into_iter()
      .map(|(user_id, reg_no)| Ok(ActiveUser { user_id: decode_uuid(&user_id)?, reg_no }))
      .collect()
  }

  async fn day_records_for(
    &self,
    pairs: &[(String, NaiveDate)],
  ) -> Result<Vec<DayAttendanceRecord>> {
    let keys: Vec<(String, String)> = pairs
      .iter()
      .map(|(reg_no, date)| (reg_no.clone(), encode_date(*date)))
      .collect();

    let raws: Vec<RawDayRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&format!(
          "SELECT {DAY_COLUMNS} FROM day_attendance WHERE reg_no = ?1 AND date = ?2"
        ))?;
        let mut found: Vec<RawDayRecord> = Vec::new();
        for (reg_no, date) in &keys {
          let row = stmt
            .query_row(rusqlite::params![reg_no, date], RawDayRecord::from_row)
            .optional()?;
          found.extend(row);
        }
        Ok(found)
      })
      .await?;

    raws.into_iter().map(RawDayRecord::into_record).collect()
  }

  async fn bulk_upsert_day_records(&self, writes: Vec<DayRecordWrite>) -> Result<BulkWriteOutcome> {
    let rows: Vec<(String, String, String, &'static str)> = writes
      .into_iter()
      .map(|w| {
        (
          w.reg_no,
          encode_date(w.date),
          encode_uuid(w.upload_id),
          w.upload_type.as_str(),
        )
      })
      .collect();
    let now = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut outcome = BulkWriteOutcome::default();
        {
          let mut stmt = tx.prepare_cached(
            "INSERT INTO day_attendance (
               reg_no, date, present, last_upload_id, last_upload_type,
               created_at, updated_at
             ) VALUES (?1, ?2, 1, ?3, ?4, ?5, ?5)
             ON CONFLICT (reg_no, date) DO UPDATE SET
               present          = 1,
               last_upload_id   = excluded.last_upload_id,
               last_upload_type = excluded.last_upload_type,
               updated_at       = excluded.updated_at",
          )?;
          // Unordered: a bad row is skipped and the rest still commit.
          for (reg_no, date, upload_id, upload_type) in &rows {
            match stmt.execute(rusqlite::params![reg_no, date, upload_id, upload_type, now]) {
              Ok(_) => outcome.written += 1,
              Err(e) => {
                tracing::warn!(%reg_no, %date, error = %e, "day record upsert failed");
                outcome.failed += 1;
              }
            }
          }
        }
        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    Ok(outcome)
  }

  async fn insert_conflicts(&self, conflicts: Vec<NewConflict>) -> Result<usize> {
    let now = encode_dt(Utc::now());
    let rows: Vec<[String; 5]> = conflicts
      .into_iter()
      .map(|c| {
        [
          encode_uuid(Uuid::new_v4()),
          c.reg_no,
          encode_date(c.date),
          encode_uuid(c.previous_upload_id),
          encode_uuid(c.new_upload_id),
        ]
      })
      .collect();

    let stored = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut stored = 0;
        {
          let mut stmt = tx.prepare_cached(
            "INSERT OR IGNORE INTO conflicts (
               conflict_id, reg_no, date, previous_upload_id, new_upload_id,
               resolved, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
          )?;
          for [id, reg_no, date, prev, new] in &rows {
            stored += stmt.execute(rusqlite::params![id, reg_no, date, prev, new, now])?;
          }
        }
        tx.commit()?;
        Ok(stored)
      })
      .await?;

    Ok(stored)
  }

  async fn create_upload(&self, input: NewUpload) -> Result<UploadRecord> {
    let upload = UploadRecord {
      upload_id:     Uuid::new_v4(),
      upload_type:   input.upload_type,
      file_name:     input.file_name,
      date_range:    input.date_range,
      total_lines:   input.total_lines,
      parsed_lines:  input.parsed_lines,
      invalid_lines: input.invalid_lines,
      created_by:    input.created_by,
      created_at:    Utc::now(),
    };

    let id_str      = encode_uuid(upload.upload_id);
    let type_str    = upload.upload_type.as_str();
    let file_name   = upload.file_name.clone();
    let from_str    = encode_date(upload.date_range.from);
    let to_str      = encode_date(upload.date_range.to);
    let counts      = [
      upload.total_lines as i64,
      upload.parsed_lines as i64,
      upload.invalid_lines as i64,
    ];
    let created_by  = upload.created_by.clone();
    let at_str      = encode_dt(upload.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO uploads (
             upload_id, upload_type, file_name, from_date, to_date,
             total_lines, parsed_lines, invalid_lines, created_by, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            id_str, type_str, file_name, from_str, to_str,
            counts[0], counts[1], counts[2], created_by, at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(upload)
  }

  // ── Uploads ───────────────────────────────────────────────────────────────

  async fn list_uploads(&self, limit: usize) -> Result<Vec<UploadRecord>> {
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawUpload> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {UPLOAD_COLUMNS} FROM uploads
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?1"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![limit_val], RawUpload::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUpload::into_upload).collect()
  }

  async fn latest_upload(&self) -> Result<Option<UploadRecord>> {
    Ok(self.list_uploads(1).await?.into_iter().next())
  }

  async fn revert_latest_uploads(&self, count: usize) -> Result<RevertOutcome> {
    let limit_val = i64::try_from(count).unwrap_or(i64::MAX);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let ids: Vec<String> = {
          let mut stmt = tx.prepare(
            "SELECT upload_id FROM uploads ORDER BY created_at DESC, rowid DESC LIMIT ?1",
          )?;
          stmt
            .query_map(rusqlite::params![limit_val], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut outcome = RevertOutcome::default();
        for id in &ids {
          outcome.day_records_deleted += tx.execute(
            "DELETE FROM day_attendance WHERE last_upload_id = ?1",
            rusqlite::params![id],
          )?;
          outcome.conflicts_deleted += tx.execute(
            "DELETE FROM conflicts WHERE new_upload_id = ?1",
            rusqlite::params![id],
          )?;
          outcome.uploads_reverted += tx.execute(
            "DELETE FROM uploads WHERE upload_id = ?1",
            rusqlite::params![id],
          )?;
        }
        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    Ok(outcome)
  }

  // ── Conflicts ─────────────────────────────────────────────────────────────

  async fn list_conflicts(&self, query: &ConflictQuery) -> Result<Vec<ConflictRecord>> {
    let unresolved_only = query.unresolved_only;
    let reg_no          = query.reg_no.clone();
    // SQLite treats a negative LIMIT as "no limit".
    let limit_val       = query
      .limit
      .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
      .unwrap_or(-1);

    let raws: Vec<RawConflict> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONFLICT_COLUMNS} FROM conflicts
           WHERE (?1 = 0 OR resolved = 0)
             AND (?2 IS NULL OR reg_no = ?2)
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?3"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![unresolved_only, reg_no, limit_val],
            RawConflict::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawConflict::into_conflict).collect()
  }

  async fn resolve_conflict(&self, conflict_id: Uuid) -> Result<Option<ConflictRecord>> {
    let id_str = encode_uuid(conflict_id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE conflicts SET resolved = 1 WHERE conflict_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.conflict_by_id(conflict_id).await
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<Option<User>> {
    let user = User {
      user_id:           Uuid::new_v4(),
      name:              input.name,
      reg_no:            input.reg_no,
      branch_code:       input.branch_code,
      semester:          input.semester,
      course_start_date: input.course_start_date,
      course_end_date:   input.course_end_date,
      role:              input.role,
      is_active:         true,
      created_at:        Utc::now(),
      email:             input.email,
    };

    let id_str     = encode_uuid(user.user_id);
    let name       = user.name.clone();
    let reg_no     = user.reg_no.clone();
    let branch     = user.branch_code.clone();
    let semester   = i64::from(user.semester);
    let start_str  = user.course_start_date.map(encode_date);
    let end_str    = user.course_end_date.map(encode_date);
    let role_str   = user.role.as_str();
    let at_str     = encode_dt(user.created_at);
    let email      = user.email.clone();

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO users (
             user_id, name, reg_no, branch_code, semester,
             course_start_date, course_end_date, role, is_active, created_at, email
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?10)
           ON CONFLICT (reg_no) DO NOTHING",
          rusqlite::params![
            id_str, name, reg_no, branch, semester, start_str, end_str, role_str, at_str,
            email,
          ],
        )?)
      })
      .await?;

    Ok((inserted > 0).then_some(user))
  }

  async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
    self.user_where("user_id", encode_uuid(user_id)).await
  }

  async fn get_user_by_reg_no(&self, reg_no: &str) -> Result<Option<User>> {
    self.user_where("reg_no", reg_no.to_owned()).await
  }

  async fn filter_students(&self, filter: &StudentFilter) -> Result<Vec<User>> {
    let semester = filter.semester.map(i64::from);
    let prefix   = filter.reg_no_prefix.clone().filter(|p| !p.is_empty());
    let role_str = Role::Student.as_str();

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {USER_COLUMNS} FROM users
           WHERE role = ?1
             AND (?2 IS NULL OR semester = ?2)
             AND (?3 IS NULL OR substr(reg_no, 1, length(?3)) = ?3)
           ORDER BY reg_no"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![role_str, semester, prefix], RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<Option<User>> {
    let id_str    = encode_uuid(user_id);
    let semester  = update.semester.map(i64::from);
    let start_str = update.course_start_date.map(encode_date);
    let end_str   = update.course_end_date.map(encode_date);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE users SET
             semester          = COALESCE(?2, semester),
             course_start_date = COALESCE(course_start_date, ?3),
             course_end_date   = COALESCE(?4, course_end_date)
           WHERE user_id = ?1",
          rusqlite::params![id_str, semester, start_str, end_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.get_user(user_id).await
  }

  async fn set_user_active(&self, user_id: Uuid, active: bool) -> Result<Option<User>> {
    let id_str = encode_uuid(user_id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE users SET is_active = ?2 WHERE user_id = ?1",
          rusqlite::params![id_str, active],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.get_user(user_id).await
  }

  async fn set_password_hash(&self, user_id: Uuid, password_hash: String) -> Result<Option<User>> {
    let id_str = encode_uuid(user_id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE users SET password_hash = ?2 WHERE user_id = ?1",
          rusqlite::params![id_str, password_hash],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.get_user(user_id).await
  }

  async fn credentials_by_reg_no(&self, reg_no: &str) -> Result<Option<UserCredentials>> {
    let reg_no = reg_no.to_owned();

    let raw: Option<(RawUser, Option<String>)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE reg_no = ?1"),
              rusqlite::params![reg_no],
              |row| Ok((RawUser::from_row(row)?, row.get(11)?)),
            )
            .optional()?,
        )
      })
      .await?;

    let Some((user, password_hash)) = raw else {
      return Ok(None);
    };
    Ok(Some(UserCredentials { user: user.into_user()?, password_hash }))
  }

  // ── Reports ───────────────────────────────────────────────────────────────

  async fn day_records_for_reg_no(
    &self,
    reg_no: &str,
    from: NaiveDate,
    to: NaiveDate,
  ) -> Result<Vec<DayAttendanceRecord>> {
    let reg_no   = reg_no.to_owned();
    let from_str = encode_date(from);
    let to_str   = encode_date(to);

    let raws: Vec<RawDayRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DAY_COLUMNS} FROM day_attendance
           WHERE reg_no = ?1 AND date BETWEEN ?2 AND ?3
           ORDER BY date"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![reg_no, from_str, to_str], RawDayRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDayRecord::into_record).collect()
  }

  // ── Holidays ──────────────────────────────────────────────────────────────

  async fn add_holiday(&self, input: NewHoliday) -> Result<Option<Holiday>> {
    let holiday = Holiday {
      date:        input.date,
      description: input.description,
      created_at:  Utc::now(),
    };

    let date_str    = encode_date(holiday.date);
    let description = holiday.description.clone();
    let at_str      = encode_dt(holiday.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO holidays (date, description, created_at) VALUES (?1, ?2, ?3)
           ON CONFLICT (date) DO NOTHING",
          rusqlite::params![date_str, description, at_str],
        )?)
      })
      .await?;

    Ok((inserted > 0).then_some(holiday))
  }

  async fn holidays_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Holiday>> {
    let from_str = encode_date(from);
    let to_str   = encode_date(to);

    let raws: Vec<RawHoliday> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT date, description, created_at FROM holidays
           WHERE date BETWEEN ?1 AND ?2
           ORDER BY date",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![from_str, to_str], RawHoliday::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHoliday::into_holiday).collect()
  }

  // ── Semesters ─────────────────────────────────────────────────────────────

  async fn promote_semester(&self, semester: u8) -> Result<PromotionOutcome> {
    let graduated = semester >= FINAL_SEMESTER;
    let sem_val   = i64::from(semester);
    let role_str  = Role::Student.as_str();

    let (students, day_records_deleted) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let deleted = delete_semester_day_records(&tx, sem_val)?;

        let sql = if graduated {
          "UPDATE users SET is_active = 0
           WHERE role = ?1 AND semester = ?2 AND is_active = 1"
        } else {
          "UPDATE users SET semester = semester + 1
           WHERE role = ?1 AND semester = ?2 AND is_active = 1"
        };
        let students = tx.execute(sql, rusqlite::params![role_str, sem_val])?;

        tx.commit()?;
        Ok((students, deleted))
      })
      .await?;

    Ok(PromotionOutcome { semester, students, day_records_deleted, graduated })
  }

  async fn clear_semester_attendance(&self, semester: u8) -> Result<SemesterClearOutcome> {
    let sem_val = i64::from(semester);

    let day_records_deleted = self
      .conn
      .call(move |conn| Ok(delete_semester_day_records(conn, sem_val)?))
      .await?;

    Ok(SemesterClearOutcome { semester, day_records_deleted })
  }
}
