//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Timestamps are stored as unix milliseconds and course properties as their
//! integer codes.

use chrono::{DateTime, Utc};
use kestack_core::course::{Course, CourseKey, CourseProperty};
use kestack_core::subscription::{CourseSubscription, FailoverCourse};
use kestack_core::term::TermRef;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_ms(dt: DateTime<Utc>) -> i64 { dt.timestamp_millis() }

pub fn decode_ms(ms: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp_millis(ms).ok_or(Error::Timestamp(ms))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawCourse::from_row`], prefixed with the `c` alias.
pub const COURSE_COLUMNS: &str =
  "c.id, c.course_code, c.name, c.teacher, c.school, c.property, c.credit";

/// Raw values read directly from a `courses` row.
pub struct RawCourse {
  pub id:          i64,
  pub course_code: String,
  pub name:        String,
  pub teacher:     String,
  pub school:      String,
  pub property:    i64,
  pub credit:      f64,
}

impl RawCourse {
  /// Read the seven [`COURSE_COLUMNS`] starting at `offset`.
  pub fn from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(offset)?,
      course_code: row.get(offset + 1)?,
      name:        row.get(offset + 2)?,
      teacher:     row.get(offset + 3)?,
      school:      row.get(offset + 4)?,
      property:    row.get(offset + 5)?,
      credit:      row.get(offset + 6)?,
    })
  }

  pub fn into_course(self) -> Result<Course> {
    Ok(Course {
      id:       self.id,
      key:      CourseKey {
        course_code: self.course_code,
        name:        self.name,
        teacher:     self.teacher,
      },
      school:   self.school,
      property: CourseProperty::from_code(self.property)?,
      credit:   self.credit,
    })
  }
}

/// A `course_subscriptions` row joined with its course.
pub struct RawSubscription {
  pub course:     RawCourse,
  pub uid:        i64,
  pub year:       String,
  pub term:       String,
  pub updated_at: i64,
}

impl RawSubscription {
  pub fn into_subscription(self) -> Result<CourseSubscription> {
    Ok(CourseSubscription {
      course:     self.course.into_course()?,
      uid:        self.uid,
      term:       TermRef { year: self.year, term: self.term },
      updated_at: decode_ms(self.updated_at)?,
    })
  }
}

/// Raw values read from a `failover_courses` row.
pub struct RawFailoverCourse {
  pub student_id:  String,
  pub course_code: String,
  pub name:        String,
  pub teacher:     String,
  pub year:        String,
  pub term:        String,
}

impl From<RawFailoverCourse> for FailoverCourse {
  fn from(raw: RawFailoverCourse) -> Self {
    FailoverCourse {
      student_id:  raw.student_id,
      course_code: raw.course_code,
      name:        raw.name,
      teacher:     raw.teacher,
      term:        TermRef { year: raw.year, term: raw.term },
    }
  }
}
