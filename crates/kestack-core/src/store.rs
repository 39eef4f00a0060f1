//! Store traits and supporting types.
//!
//! The traits are implemented by storage backends (e.g.
//! `kestack-store-sqlite`). The resolution pipeline depends on these
//! abstractions, not on any concrete backend.
//!
//! Expected outcomes are values: a lookup miss is `Ok(None)` and losing a
//! creation race is `Ok(CreateOutcome::Duplicate)`. `Err` always means the
//! store itself failed.

use std::future::Future;

use crate::{
  course::{Course, CourseId, CourseKey, Grade, NewCourse, Uid},
  subscription::{CourseSubscription, FailoverCourse, SubscriptionEvent},
  term::{TermRef, Ttl},
};

/// Result of [`IdentityStore::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
  Created(CourseId),
  /// The triple already exists: a concurrent creator got there first.
  Duplicate,
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// Owns the mapping from `(course_code, name, teacher)` to a stable id.
///
/// All methods return `Send` futures so the trait can be used from spawned
/// tasks on a multi-threaded runtime.
pub trait IdentityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Exact match on the identity triple.
  fn find_id<'a>(
    &'a self,
    key: &'a CourseKey,
  ) -> impl Future<Output = Result<Option<CourseId>, Self::Error>> + Send + 'a;

  /// As [`find_id`](Self::find_id), but a row whose property is still
  /// unknown does not match.
  fn find_id_excluding_unknown<'a>(
    &'a self,
    key: &'a CourseKey,
  ) -> impl Future<Output = Result<Option<CourseId>, Self::Error>> + Send + 'a;

  /// Insert a new course. Never overwrites an existing row.
  fn create<'a>(
    &'a self,
    course: &'a NewCourse,
  ) -> impl Future<Output = Result<CreateOutcome, Self::Error>> + Send + 'a;

  /// Insert, or on conflict advance the freshness timestamp and take the
  /// incoming property unless it is unknown. The triple, school and credit
  /// of an existing row are never touched.
  fn upsert<'a>(
    &'a self,
    course: &'a NewCourse,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Bulk import. On conflict only the freshness timestamp advances.
  fn batch_upsert<'a>(
    &'a self,
    courses: &'a [NewCourse],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn find_by_id(
    &self,
    id: CourseId,
  ) -> impl Future<Output = Result<Option<Course>, Self::Error>> + Send + '_;
}

// ─── Subscriptions ───────────────────────────────────────────────────────────

/// Owns per-user, per-term subscription rows with a freshness timestamp.
pub trait SubscriptionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Idempotent write keyed on `(uid, year, term, course_id)`. On conflict
  /// `updated_at` becomes the later of the stored and observed times.
  fn upsert_subscriptions<'a>(
    &'a self,
    events: &'a [SubscriptionEvent],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Subscriptions for `(uid, term)` whose `updated_at` lies within `ttl` of
  /// now, joined with their course rows.
  fn find_alive<'a>(
    &'a self,
    uid: Uid,
    term: &'a TermRef,
    ttl: Ttl,
  ) -> impl Future<Output = Result<Vec<CourseSubscription>, Self::Error>> + Send + 'a;

  /// Subscriber uids of a course in ascending order, strictly after
  /// `after_uid`, at most `limit` of them.
  fn find_subscriber_uids(
    &self,
    course_id: CourseId,
    after_uid: Uid,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<Uid>, Self::Error>> + Send + '_;

  fn is_subscribed(
    &self,
    uid: Uid,
    course_id: CourseId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Grades ──────────────────────────────────────────────────────────────────

/// Historical grade records. Read-only for the resolution pipeline; written
/// by the ingestion path.
pub trait GradeStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn find_grades(
    &self,
    course_id: CourseId,
  ) -> impl Future<Output = Result<Vec<Grade>, Self::Error>> + Send + '_;

  /// Keyed on `(course_id, uid, year, term)`; scores are replaced.
  fn upsert_grade<'a>(
    &'a self,
    grade: &'a Grade,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Failover snapshot ───────────────────────────────────────────────────────

/// Append-only store of raw course lists keyed by student id.
pub trait FailoverStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Append rows; rows already present are ignored.
  fn append<'a>(
    &'a self,
    courses: &'a [FailoverCourse],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn find_by_student<'a>(
    &'a self,
    student_id: &'a str,
    term: &'a TermRef,
  ) -> impl Future<Output = Result<Vec<FailoverCourse>, Self::Error>> + Send + 'a;
}
