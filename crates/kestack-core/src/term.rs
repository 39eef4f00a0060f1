//! Academic terms, the configured "current" term, and freshness windows.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::upstream::FeedSource;

// ─── TermRef ─────────────────────────────────────────────────────────────────

/// A `(year, term)` pair as the upstream reports it, e.g. `("2023", "1")`.
///
/// An empty year or term is the "all terms" wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TermRef {
  pub year: String,
  pub term: String,
}

impl TermRef {
  pub fn new(year: impl Into<String>, term: impl Into<String>) -> Self {
    Self { year: year.into(), term: term.into() }
  }

  pub fn is_wildcard(&self) -> bool { self.year.is_empty() || self.term.is_empty() }

  /// Strict chronological ordering. Years are four-digit strings and terms
  /// single digits, so the lexical tuple order is the calendar order.
  pub fn is_before(&self, other: &TermRef) -> bool {
    (self.year.as_str(), self.term.as_str()) < (other.year.as_str(), other.term.as_str())
  }
}

impl std::fmt::Display for TermRef {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}-{}", self.year, self.term)
  }
}

// ─── TermPolicy ──────────────────────────────────────────────────────────────

/// Snapshot of the operational calendar: which term is current, and whether
/// students are still adding and dropping courses in it.
///
/// Built once from configuration and handed to every stage that needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermPolicy {
  pub current:   TermRef,
  /// `true` while the enrollment period is open.
  pub selecting: bool,
}

impl TermPolicy {
  pub fn new(current: TermRef, selecting: bool) -> Self { Self { current, selecting } }

  /// A concrete term strictly earlier than the current one.
  pub fn is_historical(&self, term: &TermRef) -> bool {
    !term.is_wildcard() && term.is_before(&self.current)
  }

  /// Historical, or any term while enrollment is closed.
  pub fn is_stable(&self, term: &TermRef) -> bool {
    self.is_historical(term) || !self.selecting
  }

  /// Historical terms are read from the grade records, everything else
  /// (including the wildcard) from the live selection system.
  pub fn feed_for(&self, term: &TermRef) -> FeedSource {
    if self.is_historical(term) {
      FeedSource::HistoricalGrade
    } else {
      FeedSource::LiveSelection
    }
  }
}

// ─── Ttl ─────────────────────────────────────────────────────────────────────

/// How old a stored row may be and still count as "alive".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
  /// Every stored row is alive. Serialised as `-1`.
  Forever,
  Within(Duration),
}

impl Ttl {
  /// The configuration sentinel for [`Ttl::Forever`].
  pub const NEVER_EXPIRE: i64 = -1;

  /// Interpret a second count; negative values never expire.
  pub fn from_secs(secs: i64) -> Self {
    match u64::try_from(secs) {
      Ok(secs) => Self::Within(Duration::from_secs(secs)),
      Err(_) => Self::Forever,
    }
  }

  /// The oldest `updated_at` that is still alive at `now`, or `None` if every
  /// row is alive.
  pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match self {
      Self::Forever => None,
      Self::Within(ttl) => TimeDelta::from_std(*ttl)
        .ok()
        .and_then(|ttl| now.checked_sub_signed(ttl)),
    }
  }
}
