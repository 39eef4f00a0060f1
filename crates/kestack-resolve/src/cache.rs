//! Key-value cache contract and an in-memory implementation.

use std::{
  convert::Infallible,
  future::Future,
  sync::atomic::{AtomicUsize, Ordering},
  time::{Duration, Instant},
};

use dashmap::DashMap;
use kestack_core::course::CourseId;

pub fn course_key(id: CourseId) -> String { format!("kstack:courses:{id}") }

pub fn first_page_uids_key(id: CourseId) -> String { format!("kstack:courses:{id}:first_page_uids") }

/// A byte-valued cache with optional per-entry expiry.
///
/// Callers treat every error as a miss; the cache is never authoritative.
pub trait KvCache: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send + 'a;

  /// Store `value` under `key`, replacing any previous entry. `None` never
  /// expires.
  fn set<'a>(
    &'a self,
    key: &'a str,
    value: Vec<u8>,
    ttl: Option<Duration>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

struct Entry {
  value:      Vec<u8>,
  expires_at: Option<Instant>,
}

impl Entry {
  fn is_expired(&self, now: Instant) -> bool { self.expires_at.is_some_and(|at| at <= now) }
}

/// Every this many writes, expired entries are swept from the whole map.
const SWEEP_EVERY: usize = 256;

/// Process-local cache. Expired entries are dropped on read, and swept
/// periodically on write so keys that are never read again do not linger.
#[derive(Default)]
pub struct MemoryCache {
  entries: DashMap<String, Entry>,
  writes:  AtomicUsize,
}

impl MemoryCache {
  pub fn new() -> Self { Self::default() }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl KvCache for MemoryCache {
  type Error = Infallible;

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Infallible> {
    let now = Instant::now();
    if let Some(entry) = self.entries.get(key) {
      if !entry.is_expired(now) {
        return Ok(Some(entry.value.clone()));
      }
    } else {
      return Ok(None);
    }
    self.entries.remove_if(key, |_, entry| entry.is_expired(now));
    Ok(None)
  }

  async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), Infallible> {
    let now = Instant::now();
    if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY == 0 {
      self.entries.retain(|_, entry| !entry.is_expired(now));
    }
    let expires_at = ttl.and_then(|ttl| now.checked_add(ttl));
    self.entries.insert(key.to_owned(), Entry { value, expires_at });
    Ok(())
  }
}
