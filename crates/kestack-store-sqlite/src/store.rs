//! [`SqliteStore`]: the SQLite implementation of the kestack store traits.

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use kestack_core::{
  course::{Course, CourseId, CourseKey, Grade, NewCourse, Uid},
  store::{CreateOutcome, FailoverStore, GradeStore, IdentityStore, SubscriptionStore},
  subscription::{CourseSubscription, FailoverCourse, SubscriptionEvent},
  term::{TermRef, Ttl},
};

use crate::{
  Result,
  encode::{
    COURSE_COLUMNS, RawCourse, RawFailoverCourse, RawSubscription, encode_ms,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A kestack store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Uniqueness
/// of course triples and subscription keys is enforced by the schema, so
/// concurrent writers need no coordination beyond the conflict clauses here.
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

  /// Open an in-memory store, mostly for tests.
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

  /// Shared body of the two identity lookups.
  async fn lookup_id(&self, key: &CourseKey, exclude_unknown: bool) -> Result<Option<CourseId>> {
    let key = key.clone();
    let sql = if exclude_unknown {
      "SELECT id FROM courses
       WHERE course_code = ?1 AND name = ?2 AND teacher = ?3 AND property != 0"
    } else {
      "SELECT id FROM courses WHERE course_code = ?1 AND name = ?2 AND teacher = ?3"
    };

    let id = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              sql,
              rusqlite::params![key.course_code, key.name, key.teacher],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(id)
  }
}

// ─── IdentityStore impl ──────────────────────────────────────────────────────

impl IdentityStore for SqliteStore {
  type Error = crate::Error;

  async fn find_id(&self, key: &CourseKey) -> Result<Option<CourseId>> {
    self.lookup_id(key, false).await
  }

  async fn find_id_excluding_unknown(&self, key: &CourseKey) -> Result<Option<CourseId>> {
    self.lookup_id(key, true).await
  }

  async fn create(&self, course: &NewCourse) -> Result<CreateOutcome> {
    let course = course.clone();
    let now = encode_ms(Utc::now());

    let id: Option<CourseId> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "INSERT INTO courses (
                 course_code, name, teacher, school, property, credit,
                 created_at, updated_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
               ON CONFLICT (course_code, name, teacher) DO NOTHING
               RETURNING id",
              rusqlite::params![
                course.key.course_code,
                course.key.name,
                course.key.teacher,
                course.school,
                course.property.code(),
                course.credit,
                now,
              ],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(match id {
      Some(id) => CreateOutcome::Created(id),
      None => CreateOutcome::Duplicate,
    })
  }

  async fn upsert(&self, course: &NewCourse) -> Result<()> {
    let course = course.clone();
    let now = encode_ms(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO courses (
             course_code, name, teacher, school, property, credit,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
           ON CONFLICT (course_code, name, teacher) DO UPDATE SET
             property   = CASE WHEN excluded.property = 0
                               THEN courses.property
                               ELSE excluded.property END,
             updated_at = excluded.updated_at",
          rusqlite::params![
            course.key.course_code,
            course.key.name,
            course.key.teacher,
            course.school,
            course.property.code(),
            course.credit,
            now,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn batch_upsert(&self, courses: &[NewCourse]) -> Result<()> {
    let courses = courses.to_vec();
    let now = encode_ms(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO courses (
               course_code, name, teacher, school, property, credit,
               created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT (course_code, name, teacher) DO UPDATE SET
               updated_at = excluded.updated_at",
          )?;
          for course in &courses {
            stmt.execute(rusqlite::params![
              course.key.course_code,
              course.key.name,
              course.key.teacher,
              course.school,
              course.property.code(),
              course.credit,
              now,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn find_by_id(&self, id: CourseId) -> Result<Option<Course>> {
    let raw: Option<RawCourse> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {COURSE_COLUMNS} FROM courses c WHERE c.id = ?1"),
              rusqlite::params![id],
              |row| RawCourse::from_row(row, 0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCourse::into_course).transpose()
  }
}

// ─── SubscriptionStore impl ──────────────────────────────────────────────────

impl SubscriptionStore for SqliteStore {
  type Error = crate::Error;

  async fn upsert_subscriptions(&self, events: &[SubscriptionEvent]) -> Result<()> {
    let events = events.to_vec();
    let now = encode_ms(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO course_subscriptions (
               uid, year, term, course_id, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (uid, year, term, course_id) DO UPDATE SET
               updated_at = MAX(course_subscriptions.updated_at, excluded.updated_at)",
          )?;
          for event in &events {
            stmt.execute(rusqlite::params![
              event.uid,
              event.term.year,
              event.term.term,
              event.course_id,
              now,
              encode_ms(event.observed_at),
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn find_alive(
    &self,
    uid: Uid,
    term: &TermRef,
    ttl: Ttl,
  ) -> Result<Vec<CourseSubscription>> {
    let term = term.clone();
    let cutoff = ttl.cutoff(Utc::now()).map(encode_ms).unwrap_or(i64::MIN);

    let raws: Vec<RawSubscription> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {COURSE_COLUMNS}, s.uid, s.year, s.term, s.updated_at
           FROM course_subscriptions s
           JOIN courses c ON c.id = s.course_id
           WHERE s.uid = ?1 AND s.year = ?2 AND s.term = ?3 AND s.updated_at > ?4
           ORDER BY c.id"
        ))?;

        let rows = stmt
          .query_map(rusqlite::params![uid, term.year, term.term, cutoff], |row| {
            Ok(RawSubscription {
              course:     RawCourse::from_row(row, 0)?,
              uid:        row.get(7)?,
              year:       row.get(8)?,
              term:       row.get(9)?,
              updated_at: row.get(10)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubscription::into_subscription).collect()
  }

  async fn find_subscriber_uids(
    &self,
    course_id: CourseId,
    after_uid: Uid,
    limit: u32,
  ) -> Result<Vec<Uid>> {
    let uids = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT uid FROM course_subscriptions
           WHERE course_id = ?1 AND uid > ?2
           ORDER BY uid
           LIMIT ?3",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![course_id, after_uid, limit], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<Uid>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(uids)
  }

  async fn is_subscribed(&self, uid: Uid, course_id: CourseId) -> Result<bool> {
    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM course_subscriptions WHERE uid = ?1 AND course_id = ?2 LIMIT 1",
              rusqlite::params![uid, course_id],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(found)
  }
}

// ─── GradeStore impl ─────────────────────────────────────────────────────────

impl GradeStore for SqliteStore {
  type Error = crate::Error;

  async fn find_grades(&self, course_id: CourseId) -> Result<Vec<Grade>> {
    let grades = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT course_id, uid, year, term, regular, final_score, total
           FROM grades
           WHERE course_id = ?1
           ORDER BY year, term, uid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![course_id], |row| {
            Ok(Grade {
              course_id:   row.get(0)?,
              uid:         row.get(1)?,
              term:        TermRef { year: row.get(2)?, term: row.get(3)? },
              regular:     row.get(4)?,
              final_score: row.get(5)?,
              total:       row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(grades)
  }

  async fn upsert_grade(&self, grade: &Grade) -> Result<()> {
    let grade = grade.clone();
    let now = encode_ms(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO grades (
             course_id, uid, year, term, regular, final_score, total,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
           ON CONFLICT (course_id, uid, year, term) DO UPDATE SET
             regular     = excluded.regular,
             final_score = excluded.final_score,
             total       = excluded.total,
             updated_at  = excluded.updated_at",
          rusqlite::params![
            grade.course_id,
            grade.uid,
            grade.term.year,
            grade.term.term,
            grade.regular,
            grade.final_score,
            grade.total,
            now,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── FailoverStore impl ──────────────────────────────────────────────────────

impl FailoverStore for SqliteStore {
  type Error = crate::Error;

  async fn append(&self, courses: &[FailoverCourse]) -> Result<()> {
    let courses = courses.to_vec();
    let now = encode_ms(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO failover_courses (
               student_id, course_code, name, teacher, year, term, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT DO NOTHING",
          )?;
          for c in &courses {
            stmt.execute(rusqlite::params![
              c.student_id,
              c.course_code,
              c.name,
              c.teacher,
              c.term.year,
              c.term.term,
              now,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn find_by_student(
    &self,
    student_id: &str,
    term: &TermRef,
  ) -> Result<Vec<FailoverCourse>> {
    let student_id = student_id.to_owned();
    let term = term.clone();

    let raws: Vec<RawFailoverCourse> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT student_id, course_code, name, teacher, year, term
           FROM failover_courses
           WHERE student_id = ?1 AND year = ?2 AND term = ?3
           ORDER BY id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![student_id, term.year, term.term], |row| {
            Ok(RawFailoverCourse {
              student_id:  row.get(0)?,
              course_code: row.get(1)?,
              name:        row.get(2)?,
              teacher:     row.get(3)?,
              year:        row.get(4)?,
              term:        row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(FailoverCourse::from).collect())
  }
}
