//! Per-user course subscriptions and the legacy failover snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  course::{Course, CourseId, Uid},
  relay::RelayEvent,
  term::TermRef,
};

/// A user's enrollment in a resolved course for one term.
///
/// `updated_at` is the freshness timestamp: the last time the upstream
/// system confirmed this enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSubscription {
  pub course:     Course,
  pub uid:        Uid,
  #[serde(flatten)]
  pub term:       TermRef,
  pub updated_at: DateTime<Utc>,
}

impl CourseSubscription {
  /// The relay message that persists this subscription.
  pub fn to_event(&self) -> SubscriptionEvent {
    SubscriptionEvent {
      course_id:   self.course.id,
      uid:         self.uid,
      term:        self.term.clone(),
      observed_at: self.updated_at,
    }
  }
}

/// "User `uid` was seen enrolled in `course_id` during `term` at
/// `observed_at`." Consumers upsert it; replays only move the freshness
/// timestamp forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionEvent {
  pub course_id:   CourseId,
  pub uid:         Uid,
  #[serde(flatten)]
  pub term:        TermRef,
  pub observed_at: DateTime<Utc>,
}

impl RelayEvent for SubscriptionEvent {
  const TOPIC: &'static str = "course_subscription_events";

  fn key(&self) -> String { self.course_id.to_string() }
}

// ─── Legacy failover snapshot ────────────────────────────────────────────────

/// A course list row keyed by student id rather than by resolved identity.
///
/// Append-only; only read when the upstream is unreachable and the caller
/// did not go through identity resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FailoverCourse {
  pub student_id:  String,
  pub course_code: String,
  pub name:        String,
  pub teacher:     String,
  #[serde(flatten)]
  pub term:        TermRef,
}

/// One student's freshly fetched course list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseListEvent {
  pub student_id: String,
  pub courses:    Vec<FailoverCourse>,
}

impl RelayEvent for CourseListEvent {
  const TOPIC: &'static str = "course_list_events";

  fn key(&self) -> String { self.student_id.clone() }
}
