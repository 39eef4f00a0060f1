//! Test doubles shared by the unit tests in this crate.

use std::{
  collections::VecDeque,
  sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use kestack_core::{
  course::{Course, CourseId, CourseKey, CourseTuple, NewCourse, Uid},
  relay::{EventRelay, RelayEvent},
  store::{CreateOutcome, IdentityStore, SubscriptionStore},
  subscription::{CourseSubscription, SubscriptionEvent},
  term::{TermRef, Ttl},
  upstream::{Credentials, FeedSource, Upstream, UpstreamError},
};
use kestack_store_sqlite::{Error as StoreError, SqliteStore};
use tokio::sync::{Barrier, mpsc};

use crate::relay::RelayError;

/// Give detached tasks on the test runtime a chance to finish.
pub async fn settle() { tokio::time::sleep(Duration::from_millis(50)).await; }

// ─── Upstream ────────────────────────────────────────────────────────────────

/// Replays canned responses in order; panics when it runs out.
pub struct ScriptedUpstream {
  responses: Mutex<VecDeque<Result<Vec<CourseTuple>, UpstreamError>>>,
  sources:   Mutex<Vec<FeedSource>>,
}

impl ScriptedUpstream {
  pub fn new(responses: Vec<Result<Vec<CourseTuple>, UpstreamError>>) -> Self {
    Self { responses: Mutex::new(responses.into()), sources: Mutex::new(Vec::new()) }
  }

  /// An upstream that must never be called.
  pub fn silent() -> Self { Self::new(vec![]) }

  pub fn calls(&self) -> usize { self.sources.lock().unwrap().len() }

  pub fn sources(&self) -> Vec<FeedSource> { self.sources.lock().unwrap().clone() }
}

impl Upstream for ScriptedUpstream {
  async fn fetch_course_list(
    &self,
    _credentials: &Credentials,
    _term: &TermRef,
    source: FeedSource,
  ) -> Result<Vec<CourseTuple>, UpstreamError> {
    self.sources.lock().unwrap().push(source);
    self
      .responses
      .lock()
      .unwrap()
      .pop_front()
      .expect("upstream called more often than scripted")
  }
}

// ─── Relay ───────────────────────────────────────────────────────────────────

/// Forwards every published subscription event to a channel the test reads.
pub struct RecordingRelay {
  tx: mpsc::UnboundedSender<SubscriptionEvent>,
}

impl RecordingRelay {
  pub fn new() -> (Self, mpsc::UnboundedReceiver<SubscriptionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, rx)
  }
}

impl EventRelay for RecordingRelay {
  type Error = RelayError;

  async fn publish<'a, E: RelayEvent + 'a>(&'a self, events: &'a [E]) -> Result<(), RelayError> {
    for event in events {
      if E::TOPIC == SubscriptionEvent::TOPIC {
        let event = SubscriptionEvent::from_payload(&event.to_payload()?)?;
        self.tx.send(event).map_err(|_| RelayError::Closed)?;
      }
    }
    Ok(())
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A [`SqliteStore`] that counts calls and can be made to misbehave.
pub struct InstrumentedStore {
  pub inner:       SqliteStore,
  pub lookups:     AtomicUsize,
  pub creates:     AtomicUsize,
  pub duplicates:  AtomicUsize,
  pub upserts:     AtomicUsize,
  /// The first `n` exact lookups wait here, so `n` resolvers all miss
  /// before any of them creates.
  pub lookup_gate: Option<(Barrier, usize)>,
  pub delay:       Option<Duration>,
  pub fail_alive:  bool,
}

impl InstrumentedStore {
  pub async fn new() -> Self {
    Self {
      inner:       SqliteStore::open_in_memory().await.unwrap(),
      lookups:     AtomicUsize::new(0),
      creates:     AtomicUsize::new(0),
      duplicates:  AtomicUsize::new(0),
      upserts:     AtomicUsize::new(0),
      lookup_gate: None,
      delay:       None,
      fail_alive:  false,
    }
  }

  pub fn with_lookup_gate(mut self, n: usize) -> Self {
    self.lookup_gate = Some((Barrier::new(n), n));
    self
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn failing_alive(mut self) -> Self {
    self.fail_alive = true;
    self
  }

  async fn pause(&self) {
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
  }
}

impl IdentityStore for InstrumentedStore {
  type Error = StoreError;

  async fn find_id(&self, key: &CourseKey) -> Result<Option<CourseId>, StoreError> {
    let n = self.lookups.fetch_add(1, Ordering::SeqCst);
    if let Some((barrier, gated)) = &self.lookup_gate
      && n < *gated
    {
      let found = self.inner.find_id(key).await;
      barrier.wait().await;
      return found;
    }
    self.pause().await;
    self.inner.find_id(key).await
  }

  async fn find_id_excluding_unknown(&self, key: &CourseKey) -> Result<Option<CourseId>, StoreError> {
    self.pause().await;
    self.inner.find_id_excluding_unknown(key).await
  }

  async fn create(&self, course: &NewCourse) -> Result<CreateOutcome, StoreError> {
    self.creates.fetch_add(1, Ordering::SeqCst);
    let outcome = self.inner.create(course).await?;
    if outcome == CreateOutcome::Duplicate {
      self.duplicates.fetch_add(1, Ordering::SeqCst);
    }
    Ok(outcome)
  }

  async fn upsert(&self, course: &NewCourse) -> Result<(), StoreError> {
    self.upserts.fetch_add(1, Ordering::SeqCst);
    self.inner.upsert(course).await
  }

  async fn batch_upsert(&self, courses: &[NewCourse]) -> Result<(), StoreError> {
    self.inner.batch_upsert(courses).await
  }

  async fn find_by_id(&self, id: CourseId) -> Result<Option<Course>, StoreError> {
    self.inner.find_by_id(id).await
  }
}

impl SubscriptionStore for InstrumentedStore {
  type Error = StoreError;

  async fn upsert_subscriptions(&self, events: &[SubscriptionEvent]) -> Result<(), StoreError> {
    self.inner.upsert_subscriptions(events).await
  }

  async fn find_alive(
    &self,
    uid: Uid,
    term: &TermRef,
    ttl: Ttl,
  ) -> Result<Vec<CourseSubscription>, StoreError> {
    if self.fail_alive {
      return Err(StoreError::Timestamp(-1));
    }
    self.inner.find_alive(uid, term, ttl).await
  }

  async fn find_subscriber_uids(
    &self,
    course_id: CourseId,
    after_uid: Uid,
    limit: u32,
  ) -> Result<Vec<Uid>, StoreError> {
    self.inner.find_subscriber_uids(course_id, after_uid, limit).await
  }

  async fn is_subscribed(&self, uid: Uid, course_id: CourseId) -> Result<bool, StoreError> {
    self.inner.is_subscribed(uid, course_id).await
  }
}
