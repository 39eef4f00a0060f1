//! Bounded retries around an [`Upstream`].

use kestack_core::{
  course::CourseTuple,
  term::TermRef,
  upstream::{Credentials, FeedSource, Upstream, UpstreamError, UpstreamErrorKind},
};
use tracing::debug;

/// Retries failed fetches up to `attempts` times in total. Rejected
/// credentials are returned immediately: repeating them only risks locking
/// the account.
pub struct RetryingUpstream<U> {
  inner:    U,
  attempts: u32,
}

impl<U> RetryingUpstream<U> {
  pub fn new(inner: U, attempts: u32) -> Self { Self { inner, attempts: attempts.max(1) } }
}

impl<U: Upstream> Upstream for RetryingUpstream<U> {
  async fn fetch_course_list(
    &self,
    credentials: &Credentials,
    term: &TermRef,
    source: FeedSource,
  ) -> Result<Vec<CourseTuple>, UpstreamError> {
    let mut attempt = 1;
    loop {
      match self.inner.fetch_course_list(credentials, term, source).await {
        Ok(tuples) => return Ok(tuples),
        Err(e) if e.kind == UpstreamErrorKind::AuthRejected || attempt >= self.attempts => {
          return Err(e);
        }
        Err(e) => {
          debug!(attempt, error = %e, "upstream fetch failed, retrying");
          attempt += 1;
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::ScriptedUpstream;

  fn credentials() -> Credentials { Credentials::new("2021001", "pw") }

  #[tokio::test]
  async fn retries_until_success() {
    let upstream = ScriptedUpstream::new(vec![
      Err(UpstreamError::network("reset")),
      Err(UpstreamError::other("502")),
      Ok(vec![]),
    ]);
    let retrying = RetryingUpstream::new(upstream, 3);
    let term = TermRef::new("2024", "1");

    let result = retrying
      .fetch_course_list(&credentials(), &term, FeedSource::LiveSelection)
      .await;
    assert_eq!(result, Ok(vec![]));
    assert_eq!(retrying.inner.calls(), 3);
  }

  #[tokio::test]
  async fn gives_up_after_attempts() {
    let upstream = ScriptedUpstream::new(vec![
      Err(UpstreamError::network("a")),
      Err(UpstreamError::network("b")),
      Ok(vec![]),
    ]);
    let retrying = RetryingUpstream::new(upstream, 2);
    let term = TermRef::new("2024", "1");

    let err = retrying
      .fetch_course_list(&credentials(), &term, FeedSource::LiveSelection)
      .await
      .unwrap_err();
    assert_eq!(err, UpstreamError::network("b"));
    assert_eq!(retrying.inner.calls(), 2);
  }

  #[tokio::test]
  async fn auth_rejection_is_not_retried() {
    let upstream = ScriptedUpstream::new(vec![Err(UpstreamError::auth_rejected("bad password")), Ok(vec![])]);
    let retrying = RetryingUpstream::new(upstream, 5);
    let term = TermRef::new("2024", "1");

    let err = retrying
      .fetch_course_list(&credentials(), &term, FeedSource::LiveSelection)
      .await
      .unwrap_err();
    assert_eq!(err.kind, UpstreamErrorKind::AuthRejected);
    assert_eq!(retrying.inner.calls(), 1);
  }
}
