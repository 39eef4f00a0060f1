//! SQL schema for the kestack SQLite store.
//!
//! Executed once at connection startup. Timestamps are unix milliseconds so
//! freshness comparisons stay integer comparisons.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per identity triple. Never deleted.
CREATE TABLE IF NOT EXISTS courses (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    course_code TEXT    NOT NULL,
    name        TEXT    NOT NULL,
    teacher     TEXT    NOT NULL,
    school      TEXT    NOT NULL DEFAULT '',
    property    INTEGER NOT NULL DEFAULT 0,   -- 0 = unknown
    credit      REAL    NOT NULL DEFAULT 0,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL,
    UNIQUE (course_code, name, teacher)
);

CREATE INDEX IF NOT EXISTS courses_key_property_idx
    ON courses(course_code, name, teacher, property);

CREATE TABLE IF NOT EXISTS course_subscriptions (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    uid         INTEGER NOT NULL,
    year        TEXT    NOT NULL,
    term        TEXT    NOT NULL,
    course_id   INTEGER NOT NULL REFERENCES courses(id),
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL,   -- freshness; only ever moves forward
    UNIQUE (uid, year, term, course_id)
);

CREATE INDEX IF NOT EXISTS course_subscriptions_course_uid_idx
    ON course_subscriptions(course_id, uid);

CREATE TABLE IF NOT EXISTS grades (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id   INTEGER NOT NULL REFERENCES courses(id),
    uid         INTEGER NOT NULL,
    year        TEXT    NOT NULL,
    term        TEXT    NOT NULL,
    regular     REAL    NOT NULL,
    final_score REAL    NOT NULL,
    total       REAL    NOT NULL,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL,
    UNIQUE (course_id, uid, year, term)
);

-- Raw course lists keyed by student id. Append-only.
CREATE TABLE IF NOT EXISTS failover_courses (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id  TEXT    NOT NULL,
    course_code TEXT    NOT NULL,
    name        TEXT    NOT NULL,
    teacher     TEXT    NOT NULL,
    year        TEXT    NOT NULL,
    term        TEXT    NOT NULL,
    created_at  INTEGER NOT NULL,
    UNIQUE (student_id, year, term, course_code, name, teacher)
);

PRAGMA user_version = 1;
";
