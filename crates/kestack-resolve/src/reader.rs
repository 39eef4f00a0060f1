//! Read-through access to course details and subscriber lists.
//!
//! The cache only ever speeds reads up. A cache error or a corrupt entry is
//! logged and treated as a miss; the store answers instead.

use std::{sync::Arc, time::Duration};

use kestack_core::{
  course::{CourseDetail, CourseId, Uid},
  store::{GradeStore, IdentityStore, SubscriptionStore},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::{
  Error, Result,
  cache::{KvCache, course_key, first_page_uids_key},
};

/// Only the opening page of a subscriber listing is cached.
pub const FIRST_PAGE_SIZE: u32 = 10;
pub const DEFAULT_FIRST_PAGE_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_DETAIL_TTL: Duration = Duration::from_secs(30 * 60);
/// Deadline for a detached cache write.
pub const POPULATE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct CourseReader<S, C> {
  store:          Arc<S>,
  cache:          Arc<C>,
  first_page_ttl: Duration,
  detail_ttl:     Duration,
}

impl<S, C> CourseReader<S, C>
where
  S: IdentityStore + SubscriptionStore + GradeStore + 'static,
  C: KvCache + 'static,
{
  pub fn new(store: Arc<S>, cache: Arc<C>) -> Self {
    Self {
      store,
      cache,
      first_page_ttl: DEFAULT_FIRST_PAGE_TTL,
      detail_ttl: DEFAULT_DETAIL_TTL,
    }
  }

  pub fn with_ttls(mut self, first_page_ttl: Duration, detail_ttl: Duration) -> Self {
    self.first_page_ttl = first_page_ttl;
    self.detail_ttl = detail_ttl;
    self
  }

  /// A course together with every recorded grade for it.
  pub async fn course_detail(&self, id: CourseId) -> Result<CourseDetail> {
    let key = course_key(id);
    if let Some(detail) = self.cached(&key).await {
      return Ok(detail);
    }

    let course = self
      .store
      .find_by_id(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::CourseNotFound(id))?;
    let grades = self.store.find_grades(id).await.map_err(Error::store)?;
    let detail = CourseDetail { course, grades };

    self.populate(key, &detail, self.detail_ttl);
    Ok(detail)
  }

  /// Subscribers of `course_id` with a uid above `cur_uid`, ascending.
  pub async fn subscriber_uids(&self, course_id: CourseId, cur_uid: Uid, limit: u32) -> Result<Vec<Uid>> {
    let first_page = cur_uid == 0 && limit == FIRST_PAGE_SIZE;
    let key = first_page_uids_key(course_id);
    if first_page && let Some(uids) = self.cached(&key).await {
      return Ok(uids);
    }

    let uids = self
      .store
      .find_subscriber_uids(course_id, cur_uid, limit)
      .await
      .map_err(Error::store)?;

    if first_page {
      self.populate(key, &uids, self.first_page_ttl);
    }
    Ok(uids)
  }

  pub async fn is_subscribed(&self, uid: Uid, course_id: CourseId) -> Result<bool> {
    self.store.is_subscribed(uid, course_id).await.map_err(Error::store)
  }

  async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    match self.cache.get(key).await {
      Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
          warn!(key, error = %e, "ignoring corrupt cache entry");
          None
        }
      },
      Ok(None) => None,
      Err(e) => {
        warn!(key, error = %e, "cache read failed");
        None
      }
    }
  }

  /// Write `value` to the cache without delaying the caller.
  fn populate<T: Serialize>(&self, key: String, value: &T, ttl: Duration) {
    let payload = match serde_json::to_vec(value) {
      Ok(payload) => payload,
      Err(e) => {
        warn!(key = %key, error = %e, "failed to encode cache entry");
        return;
      }
    };
    let cache = Arc::clone(&self.cache);
    tokio::spawn(async move {
      match tokio::time::timeout(POPULATE_TIMEOUT, cache.set(&key, payload, Some(ttl))).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(key = %key, error = %e, "failed to populate cache"),
        Err(_) => warn!(key = %key, "timed out populating cache"),
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use kestack_core::{
    course::{CourseKey, CourseProperty, Grade, NewCourse},
    store::CreateOutcome,
    subscription::SubscriptionEvent,
    term::TermRef,
  };
  use kestack_store_sqlite::SqliteStore;

  use super::*;
  use crate::{MemoryCache, testing::settle};

  async fn fixture() -> (Arc<SqliteStore>, Arc<MemoryCache>, CourseId) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let course = NewCourse::new(CourseKey::new("C1", "Compilers", "Qian"), CourseProperty::MajorCore);
    let CreateOutcome::Created(id) = store.create(&course).await.unwrap() else {
      panic!("fresh store reported a duplicate");
    };
    (Arc::new(store), Arc::new(MemoryCache::new()), id)
  }

  async fn subscribe(store: &SqliteStore, course_id: CourseId, uids: impl IntoIterator<Item = Uid>) {
    let events: Vec<_> = uids
      .into_iter()
      .map(|uid| SubscriptionEvent {
        course_id,
        uid,
        term: TermRef::new("2023", "1"),
        observed_at: chrono::Utc::now(),
      })
      .collect();
    store.upsert_subscriptions(&events).await.unwrap();
  }

  #[tokio::test]
  async fn course_detail_includes_grades_and_is_cached() {
    let (store, cache, id) = fixture().await;
    let grade = Grade {
      course_id:   id,
      uid:         7,
      term:        TermRef::new("2023", "1"),
      regular:     90.0,
      final_score: 80.0,
      total:       84.0,
    };
    store.upsert_grade(&grade).await.unwrap();
    let reader = CourseReader::new(Arc::clone(&store), Arc::clone(&cache));

    let detail = reader.course_detail(id).await.unwrap();
    assert_eq!(detail.course.id, id);
    assert_eq!(detail.grades, vec![grade]);

    settle().await;
    let cached = cache.get(&course_key(id)).await.unwrap().unwrap();
    let cached: CourseDetail = serde_json::from_slice(&cached).unwrap();
    assert_eq!(cached, detail);
  }

  #[tokio::test]
  async fn unknown_course_is_not_found() {
    let (store, cache, id) = fixture().await;
    let reader = CourseReader::new(store, cache);
    assert!(matches!(reader.course_detail(id + 1).await, Err(Error::CourseNotFound(_))));
  }

  #[tokio::test]
  async fn corrupt_cache_entry_falls_through_to_store() {
    let (store, cache, id) = fixture().await;
    cache.set(&course_key(id), b"not json".to_vec(), None).await.unwrap();
    let reader = CourseReader::new(store, cache);

    assert_eq!(reader.course_detail(id).await.unwrap().course.id, id);
  }

  #[tokio::test]
  async fn first_page_is_served_from_cache() {
    let (store, cache, id) = fixture().await;
    subscribe(&store, id, 1..=12).await;
    let reader = CourseReader::new(Arc::clone(&store), Arc::clone(&cache));

    let first = reader.subscriber_uids(id, 0, FIRST_PAGE_SIZE).await.unwrap();
    assert_eq!(first, (1..=10).collect::<Vec<_>>());
    settle().await;

    let key = first_page_uids_key(id);
    let cached: Vec<Uid> = serde_json::from_slice(&cache.get(&key).await.unwrap().unwrap()).unwrap();
    assert_eq!(cached, first);

    // Later reads of the first page never reach the store.
    cache.set(&key, b"[99]".to_vec(), None).await.unwrap();
    assert_eq!(reader.subscriber_uids(id, 0, FIRST_PAGE_SIZE).await.unwrap(), vec![99]);
  }

  #[tokio::test]
  async fn other_pages_bypass_the_cache() {
    let (store, cache, id) = fixture().await;
    subscribe(&store, id, 1..=12).await;
    let reader = CourseReader::new(Arc::clone(&store), Arc::clone(&cache));

    assert_eq!(reader.subscriber_uids(id, 10, FIRST_PAGE_SIZE).await.unwrap(), vec![11, 12]);
    assert_eq!(reader.subscriber_uids(id, 0, 5).await.unwrap(), vec![1, 2, 3, 4, 5]);
    settle().await;
    assert!(cache.is_empty());
  }

  #[tokio::test]
  async fn subscribed_reflects_store() {
    let (store, cache, id) = fixture().await;
    subscribe(&store, id, [7]).await;
    let reader = CourseReader::new(store, cache);

    assert!(reader.is_subscribed(7, id).await.unwrap());
    assert!(!reader.is_subscribed(8, id).await.unwrap());
  }
}
