//! Integration tests for `SqliteStore` against an in-memory database.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use kestack_core::{
  course::{CourseKey, CourseProperty, Grade, NewCourse},
  store::{CreateOutcome, FailoverStore, GradeStore, IdentityStore, SubscriptionStore},
  subscription::{FailoverCourse, SubscriptionEvent},
  term::{TermRef, Ttl},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn key(code: &str) -> CourseKey { CourseKey::new(code, "Data Structures", "Li") }

fn course(code: &str, property: CourseProperty) -> NewCourse {
  NewCourse {
    key: key(code),
    school: "Computer Science".into(),
    property,
    credit: 3.5,
  }
}

async fn created(s: &SqliteStore, c: &NewCourse) -> i64 {
  match s.create(c).await.unwrap() {
    CreateOutcome::Created(id) => id,
    CreateOutcome::Duplicate => panic!("unexpected duplicate for {}", c.key),
  }
}

fn event(course_id: i64, uid: i64, term: &TermRef, ago: TimeDelta) -> SubscriptionEvent {
  SubscriptionEvent {
    course_id,
    uid,
    term: term.clone(),
    observed_at: Utc::now() - ago,
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_then_find_by_triple() {
  let s = store().await;
  let id = created(&s, &course("A001", CourseProperty::MajorCore)).await;

  assert_eq!(s.find_id(&key("A001")).await.unwrap(), Some(id));
  assert_eq!(s.find_id(&key("A002")).await.unwrap(), None);

  let fetched = s.find_by_id(id).await.unwrap().unwrap();
  assert_eq!(fetched.key, key("A001"));
  assert_eq!(fetched.property, CourseProperty::MajorCore);
  assert_eq!(fetched.school, "Computer Science");
  assert_eq!(fetched.credit, 3.5);
}

#[tokio::test]
async fn second_create_of_same_triple_is_duplicate() {
  let s = store().await;
  let id = created(&s, &course("A001", CourseProperty::Unknown)).await;

  let again = s.create(&course("A001", CourseProperty::MajorCore)).await.unwrap();
  assert_eq!(again, CreateOutcome::Duplicate);

  // The losing create must not have touched the winner's row.
  let stored = s.find_by_id(id).await.unwrap().unwrap();
  assert_eq!(stored.property, CourseProperty::Unknown);
}

#[tokio::test]
async fn find_excluding_unknown_skips_placeholders() {
  let s = store().await;
  created(&s, &course("A001", CourseProperty::Unknown)).await;
  let known = created(&s, &course("B001", CourseProperty::GeneralCore)).await;

  assert_eq!(s.find_id_excluding_unknown(&key("A001")).await.unwrap(), None);
  assert_eq!(s.find_id_excluding_unknown(&key("B001")).await.unwrap(), Some(known));
}

#[tokio::test]
async fn upsert_upgrades_unknown_property() {
  let s = store().await;
  let id = created(&s, &course("A001", CourseProperty::Unknown)).await;

  s.upsert(&course("A001", CourseProperty::MajorElective)).await.unwrap();

  let stored = s.find_by_id(id).await.unwrap().unwrap();
  assert_eq!(stored.property, CourseProperty::MajorElective);
  assert_eq!(s.find_id_excluding_unknown(&key("A001")).await.unwrap(), Some(id));
}

#[tokio::test]
async fn upsert_never_downgrades_known_property() {
  let s = store().await;
  let id = created(&s, &course("A001", CourseProperty::MajorCore)).await;

  s.upsert(&course("A001", CourseProperty::Unknown)).await.unwrap();

  let stored = s.find_by_id(id).await.unwrap().unwrap();
  assert_eq!(stored.property, CourseProperty::MajorCore);
}

#[tokio::test]
async fn upsert_keeps_school_and_credit_of_existing_row() {
  let s = store().await;
  let id = created(&s, &course("A001", CourseProperty::Unknown)).await;

  let mut incoming = course("A001", CourseProperty::GeneralCore);
  incoming.school = "Elsewhere".into();
  incoming.credit = 1.0;
  s.upsert(&incoming).await.unwrap();

  let stored = s.find_by_id(id).await.unwrap().unwrap();
  assert_eq!(stored.school, "Computer Science");
  assert_eq!(stored.credit, 3.5);
}

#[tokio::test]
async fn upsert_inserts_when_absent() {
  let s = store().await;
  s.upsert(&course("A001", CourseProperty::GeneralRequired)).await.unwrap();
  assert!(s.find_id_excluding_unknown(&key("A001")).await.unwrap().is_some());
}

#[tokio::test]
async fn batch_upsert_keeps_existing_property() {
  let s = store().await;
  let id = created(&s, &course("A001", CourseProperty::MajorCore)).await;

  s.batch_upsert(&[
    course("A001", CourseProperty::GeneralCore),
    course("A002", CourseProperty::GeneralElective),
  ])
  .await
  .unwrap();

  assert_eq!(
    s.find_by_id(id).await.unwrap().unwrap().property,
    CourseProperty::MajorCore
  );
  assert!(s.find_id(&key("A002")).await.unwrap().is_some());
}

#[tokio::test]
async fn find_by_id_missing_returns_none() {
  let s = store().await;
  assert!(s.find_by_id(404).await.unwrap().is_none());
}

// ─── Subscriptions ───────────────────────────────────────────────────────────

#[tokio::test]
async fn alive_window_boundaries() {
  let s = store().await;
  let term = TermRef::new("2023", "1");
  let ttl = Duration::from_secs(3600);
  let stale = created(&s, &course("A001", CourseProperty::MajorCore)).await;
  let fresh = created(&s, &course("A002", CourseProperty::MajorCore)).await;

  s.upsert_subscriptions(&[
    event(stale, 7, &term, TimeDelta::seconds(3601)),
    event(fresh, 7, &term, TimeDelta::seconds(3599)),
  ])
  .await
  .unwrap();

  let alive = s.find_alive(7, &term, Ttl::Within(ttl)).await.unwrap();
  assert_eq!(alive.len(), 1);
  assert_eq!(alive[0].course.id, fresh);
  assert_eq!(alive[0].course.key, key("A002"));

  let everything = s.find_alive(7, &term, Ttl::Forever).await.unwrap();
  assert_eq!(everything.len(), 2);
}

#[tokio::test]
async fn alive_is_scoped_to_user_and_term() {
  let s = store().await;
  let id = created(&s, &course("A001", CourseProperty::MajorCore)).await;
  let term = TermRef::new("2023", "1");

  s.upsert_subscriptions(&[
    event(id, 7, &term, TimeDelta::zero()),
    event(id, 8, &term, TimeDelta::zero()),
    event(id, 7, &TermRef::new("2023", "2"), TimeDelta::zero()),
  ])
  .await
  .unwrap();

  let alive = s.find_alive(7, &term, Ttl::Forever).await.unwrap();
  assert_eq!(alive.len(), 1);
  assert_eq!(alive[0].uid, 7);
  assert_eq!(alive[0].term, term);
}

#[tokio::test]
async fn replayed_event_is_idempotent_and_timestamp_moves_forward() {
  let s = store().await;
  let id = created(&s, &course("A001", CourseProperty::MajorCore)).await;
  let term = TermRef::new("2023", "1");

  let older = event(id, 7, &term, TimeDelta::seconds(30));
  let newer = event(id, 7, &term, TimeDelta::seconds(10));

  s.upsert_subscriptions(std::slice::from_ref(&newer)).await.unwrap();
  s.upsert_subscriptions(std::slice::from_ref(&newer)).await.unwrap();
  // A late redelivery of an older observation must not rewind freshness.
  s.upsert_subscriptions(std::slice::from_ref(&older)).await.unwrap();

  let alive = s.find_alive(7, &term, Ttl::Forever).await.unwrap();
  assert_eq!(alive.len(), 1);
  assert_eq!(
    alive[0].updated_at.timestamp_millis(),
    newer.observed_at.timestamp_millis()
  );
}

#[tokio::test]
async fn subscription_for_missing_course_is_rejected() {
  let s = store().await;
  let term = TermRef::new("2023", "1");
  let result = s
    .upsert_subscriptions(&[event(999, 7, &term, TimeDelta::zero())])
    .await;
  assert!(result.is_err());
}

#[tokio::test]
async fn subscriber_uids_paginate_by_cursor() {
  let s = store().await;
  let id = created(&s, &course("A001", CourseProperty::MajorCore)).await;
  let t1 = TermRef::new("2023", "1");
  let t2 = TermRef::new("2023", "2");

  let mut events: Vec<_> = [5, 1, 4, 2, 3]
    .into_iter()
    .map(|uid| event(id, uid, &t1, TimeDelta::zero()))
    .collect();
  // The same user in a second term must only be listed once.
  events.push(event(id, 2, &t2, TimeDelta::zero()));
  s.upsert_subscriptions(&events).await.unwrap();

  assert_eq!(s.find_subscriber_uids(id, 0, 3).await.unwrap(), vec![1, 2, 3]);
  assert_eq!(s.find_subscriber_uids(id, 3, 3).await.unwrap(), vec![4, 5]);
  assert!(s.find_subscriber_uids(id, 5, 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn is_subscribed_checks_any_term() {
  let s = store().await;
  let id = created(&s, &course("A001", CourseProperty::MajorCore)).await;
  s.upsert_subscriptions(&[event(id, 7, &TermRef::new("2022", "2"), TimeDelta::zero())])
    .await
    .unwrap();

  assert!(s.is_subscribed(7, id).await.unwrap());
  assert!(!s.is_subscribed(8, id).await.unwrap());
}

// ─── Grades ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn grades_upsert_replaces_scores() {
  let s = store().await;
  let id = created(&s, &course("A001", CourseProperty::MajorCore)).await;
  let mut grade = Grade {
    course_id:   id,
    uid:         7,
    term:        TermRef::new("2022", "1"),
    regular:     80.0,
    final_score: 70.0,
    total:       74.0,
  };
  s.upsert_grade(&grade).await.unwrap();
  grade.total = 90.0;
  s.upsert_grade(&grade).await.unwrap();

  let grades = s.find_grades(id).await.unwrap();
  assert_eq!(grades, vec![grade]);
  assert!(s.find_grades(id + 1).await.unwrap().is_empty());
}

// ─── Failover snapshot ───────────────────────────────────────────────────────

fn failover(student_id: &str, code: &str, term: &TermRef) -> FailoverCourse {
  FailoverCourse {
    student_id:  student_id.into(),
    course_code: code.into(),
    name:        "Calculus".into(),
    teacher:     "Wang".into(),
    term:        term.clone(),
  }
}

#[tokio::test]
async fn failover_append_ignores_repeats() {
  let s = store().await;
  let term = TermRef::new("2023", "1");
  let rows = vec![failover("2021001", "M1", &term), failover("2021001", "M2", &term)];

  s.append(&rows).await.unwrap();
  s.append(&rows).await.unwrap();
  s.append(&[failover("2021002", "M1", &term)]).await.unwrap();

  let found = s.find_by_student("2021001", &term).await.unwrap();
  assert_eq!(found, rows);
  assert!(
    s.find_by_student("2021001", &TermRef::new("2023", "2"))
      .await
      .unwrap()
      .is_empty()
  );
}
