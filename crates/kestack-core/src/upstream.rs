//! The upstream student-information system, as consumed by this service.
//!
//! Only the contract lives here; the HTTP adapter is wired in by the server
//! binary and stubs stand in for it in tests.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{course::CourseTuple, term::TermRef};

/// Which upstream feed to read a course list from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSource {
  /// The course-selection system: current, sparse, never classified.
  LiveSelection,
  /// The grade records: historical and fully classified.
  HistoricalGrade,
}

/// Upstream login. `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
  pub student_id: String,
  pub password:   String,
}

impl Credentials {
  pub fn new(student_id: impl Into<String>, password: impl Into<String>) -> Self {
    Self { student_id: student_id.into(), password: password.into() }
  }
}

impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Credentials")
      .field("student_id", &self.student_id)
      .field("password", &"<redacted>")
      .finish()
  }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// How an upstream failure should be treated downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamErrorKind {
  /// Unreachable or timed out. Eligible for degradation to stored data.
  NetworkToUpstream,
  /// The upstream refused the credentials.
  AuthRejected,
  Other,
}

impl std::fmt::Display for UpstreamErrorKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      Self::NetworkToUpstream => "network to upstream",
      Self::AuthRejected => "auth rejected",
      Self::Other => "other",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("upstream error ({kind}): {detail}")]
pub struct UpstreamError {
  pub kind:   UpstreamErrorKind,
  pub detail: String,
}

impl UpstreamError {
  pub fn new(kind: UpstreamErrorKind, detail: impl Into<String>) -> Self {
    Self { kind, detail: detail.into() }
  }

  pub fn network(detail: impl Into<String>) -> Self {
    Self::new(UpstreamErrorKind::NetworkToUpstream, detail)
  }

  pub fn auth_rejected(detail: impl Into<String>) -> Self {
    Self::new(UpstreamErrorKind::AuthRejected, detail)
  }

  pub fn other(detail: impl Into<String>) -> Self { Self::new(UpstreamErrorKind::Other, detail) }

  pub fn is_network(&self) -> bool { self.kind == UpstreamErrorKind::NetworkToUpstream }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the upstream course-list endpoint.
pub trait Upstream: Send + Sync {
  /// Fetch the course list for `term` (or every term, when `term` is the
  /// wildcard) from the given feed.
  fn fetch_course_list<'a>(
    &'a self,
    credentials: &'a Credentials,
    term: &'a TermRef,
    source: FeedSource,
  ) -> impl Future<Output = Result<Vec<CourseTuple>, UpstreamError>> + Send + 'a;
}
