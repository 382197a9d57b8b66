//! SQL schema for the Rollcall SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id           TEXT PRIMARY KEY,
    name              TEXT NOT NULL,
    reg_no            TEXT NOT NULL UNIQUE,
    branch_code       TEXT,
    semester          INTEGER NOT NULL CHECK (semester BETWEEN 1 AND 8),
    course_start_date TEXT,            -- YYYY-MM-DD
    course_end_date   TEXT,            -- YYYY-MM-DD
    role              TEXT NOT NULL DEFAULT 'STUDENT',
    is_active         INTEGER NOT NULL DEFAULT 1,
    created_at        TEXT NOT NULL,
    email             TEXT,
    password_hash     TEXT             -- argon2 PHC string; NULL until set
);

-- One row per accepted biometric file. Never updated.
CREATE TABLE IF NOT EXISTS uploads (
    upload_id     TEXT PRIMARY KEY,
    upload_type   TEXT NOT NULL,       -- 'WEEKLY' | 'MONTHLY' | 'YEARLY' | 'MANUAL'
    file_name     TEXT NOT NULL,
    from_date     TEXT NOT NULL,
    to_date       TEXT NOT NULL,
    total_lines   INTEGER NOT NULL,
    parsed_lines  INTEGER NOT NULL,
    invalid_lines INTEGER NOT NULL,
    created_by    TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    CHECK (from_date <= to_date)
);

-- At most one row per (reg_no, date); upserted by each upload that asserts it.
CREATE TABLE IF NOT EXISTS day_attendance (
    reg_no           TEXT NOT NULL,
    date             TEXT NOT NULL CHECK (date LIKE '____-__-__'),
    present          INTEGER NOT NULL DEFAULT 1,
    last_upload_id   TEXT NOT NULL REFERENCES uploads(upload_id),
    last_upload_type TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    PRIMARY KEY (reg_no, date)
);

-- Append-only log of uploads disagreeing about a (reg_no, date).
CREATE TABLE IF NOT EXISTS conflicts (
    conflict_id        TEXT PRIMARY KEY,
    reg_no             TEXT NOT NULL,
    date               TEXT NOT NULL,
    previous_upload_id TEXT NOT NULL,
    new_upload_id      TEXT NOT NULL,
    resolved           INTEGER NOT NULL DEFAULT 0,
    created_at         TEXT NOT NULL,
    UNIQUE (reg_no, date, previous_upload_id, new_upload_id)
);

CREATE TABLE IF NOT EXISTS holidays (
    date        TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS uploads_created_idx    ON uploads(created_at);
CREATE INDEX IF NOT EXISTS uploads_range_idx      ON uploads(from_date, to_date);
CREATE INDEX IF NOT EXISTS day_upload_idx         ON day_attendance(last_upload_id);
CREATE INDEX IF NOT EXISTS conflicts_new_idx      ON conflicts(new_upload_id);
CREATE INDEX IF NOT EXISTS users_semester_idx     ON users(semester);

PRAGMA user_version = 1;
";
