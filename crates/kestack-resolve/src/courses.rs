//! The legacy course-list path, keyed by student id instead of by course
//! identity.
//!
//! Successful fetches are snapshotted over the relay into the failover
//! store; when the upstream is unreachable the snapshot is served instead.

use std::{sync::Arc, time::Duration};

use kestack_core::{
  relay::EventRelay,
  store::FailoverStore,
  subscription::{CourseListEvent, FailoverCourse},
  term::{TermPolicy, TermRef},
  upstream::{Credentials, Upstream},
};
use tracing::warn;

use crate::{Error, Result, fallback::DEFAULT_EMIT_TIMEOUT, relay::publish_detached};

pub struct CourseLister<U, F, E> {
  upstream:     Arc<U>,
  store:        Arc<F>,
  relay:        Arc<E>,
  policy:       TermPolicy,
  emit_timeout: Duration,
}

impl<U, F, E> CourseLister<U, F, E>
where
  U: Upstream + 'static,
  F: FailoverStore + 'static,
  E: EventRelay + 'static,
{
  pub fn new(upstream: Arc<U>, store: Arc<F>, relay: Arc<E>, policy: TermPolicy) -> Self {
    Self { upstream, store, relay, policy, emit_timeout: DEFAULT_EMIT_TIMEOUT }
  }

  pub fn with_emit_timeout(mut self, emit_timeout: Duration) -> Self {
    self.emit_timeout = emit_timeout;
    self
  }

  pub async fn list(&self, credentials: &Credentials, term: &TermRef) -> Result<Vec<FailoverCourse>> {
    let source = self.policy.feed_for(term);
    match self.upstream.fetch_course_list(credentials, term, source).await {
      Ok(tuples) => {
        let courses: Vec<FailoverCourse> = tuples
          .into_iter()
          .map(|t| FailoverCourse {
            student_id:  credentials.student_id.clone(),
            course_code: t.course.key.course_code,
            name:        t.course.key.name,
            teacher:     t.course.key.teacher,
            term:        t.term,
          })
          .collect();
        let event = CourseListEvent { student_id: credentials.student_id.clone(), courses: courses.clone() };
        publish_detached(Arc::clone(&self.relay), vec![event], self.emit_timeout);
        Ok(courses)
      }
      Err(e) if e.is_network() => {
        warn!(student_id = %credentials.student_id, %term, error = %e, "upstream unreachable, serving failover snapshot");
        let stored = self
          .store
          .find_by_student(&credentials.student_id, term)
          .await
          .map_err(Error::store)?;
        if stored.is_empty() {
          return Err(Error::DegradedDataNotFound(term.clone()));
        }
        Ok(stored)
      }
      Err(e) => Err(e.into()),
    }
  }
}
