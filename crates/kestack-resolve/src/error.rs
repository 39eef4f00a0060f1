//! Error type for the resolution pipeline.

use kestack_core::{
  course::{CourseId, CourseKey},
  term::TermRef,
  upstream::{UpstreamError, UpstreamErrorKind},
};
use thiserror::Error;

/// Errors produced while resolving or reading courses.
#[derive(Debug, Error)]
pub enum Error {
  #[error("a uid is required for this request")]
  MissingUid,

  #[error("upstream unreachable and no stored data for term {0}")]
  DegradedDataNotFound(TermRef),

  #[error(transparent)]
  Upstream(#[from] UpstreamError),

  #[error("course {0} not found")]
  CourseNotFound(CourseId),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("timed out during {0}")]
  Timeout(&'static str),

  /// Lost a creation race, yet the winner's row is still not visible.
  #[error("course {0} lost a creation race but no winning row exists")]
  InconsistentIdentity(CourseKey),

  #[error("resolution task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

/// Coarse classification of an [`Error`], used by callers that map errors
/// onto a transport (HTTP status codes, log levels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  InvalidRequest,
  NotFound,
  NetworkToUpstream,
  AuthRejected,
  Upstream,
  Internal,
}

impl Error {
  /// Box a backend error.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::MissingUid => ErrorKind::InvalidRequest,
      Self::DegradedDataNotFound(_) | Self::CourseNotFound(_) => ErrorKind::NotFound,
      Self::Upstream(e) => match e.kind {
        UpstreamErrorKind::NetworkToUpstream => ErrorKind::NetworkToUpstream,
        UpstreamErrorKind::AuthRejected => ErrorKind::AuthRejected,
        UpstreamErrorKind::Other => ErrorKind::Upstream,
      },
      Self::Store(_) | Self::Timeout(_) | Self::InconsistentIdentity(_) | Self::Task(_) => {
        ErrorKind::Internal
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
