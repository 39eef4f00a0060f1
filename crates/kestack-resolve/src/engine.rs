//! Identity resolution: map upstream course tuples to stable course ids.
//!
//! Every tuple is resolved in its own task. Results are written back by
//! input position, so the output order always matches the input order no
//! matter which task finishes first.
//!
//! Two merge policies exist, chosen per tuple from the tuple's own term:
//!
//! - [`MergePolicy::Current`]: the live feed never classifies courses, so a
//!   placeholder row is created on a miss and never rewritten. Concurrent
//!   creators are reconciled through [`CreateOutcome::Duplicate`].
//! - [`MergePolicy::Historical`]: the grade feed carries the definitive
//!   property, so a placeholder is upgraded in place by an upsert.

use std::{sync::Arc, time::Duration};

use kestack_core::{
  course::{Course, CourseId, CourseTuple, NewCourse},
  store::{CreateOutcome, IdentityStore},
  term::{TermPolicy, TermRef},
};
use tokio::task::JoinSet;
use tracing::debug;

use crate::{Error, Result, normalize::normalize};

/// Per-tuple deadline applied to each resolution task.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
  Current,
  Historical,
}

/// A tuple after resolution: the course with its stable id, and the term it
/// was reported in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCourse {
  pub course: Course,
  pub term:   TermRef,
}

struct WorkItem {
  index:  usize,
  policy: MergePolicy,
  course: NewCourse,
}

pub struct IdentityResolver<S> {
  store:        Arc<S>,
  policy:       TermPolicy,
  task_timeout: Duration,
}

impl<S> Clone for IdentityResolver<S> {
  fn clone(&self) -> Self {
    Self {
      store:        Arc::clone(&self.store),
      policy:       self.policy.clone(),
      task_timeout: self.task_timeout,
    }
  }
}

impl<S> IdentityResolver<S>
where
  S: IdentityStore + 'static,
{
  pub fn new(store: Arc<S>, policy: TermPolicy) -> Self {
    Self { store, policy, task_timeout: DEFAULT_TASK_TIMEOUT }
  }

  pub fn with_task_timeout(mut self, task_timeout: Duration) -> Self {
    self.task_timeout = task_timeout;
    self
  }

  pub fn policy(&self) -> &TermPolicy { &self.policy }

  pub fn merge_policy(&self, term: &TermRef) -> MergePolicy {
    if self.policy.is_historical(term) {
      MergePolicy::Historical
    } else {
      MergePolicy::Current
    }
  }

  /// Resolve every tuple concurrently.
  ///
  /// The first failure aborts the whole batch; tasks still in flight are
  /// cancelled when the set is dropped.
  pub async fn resolve_all(&self, tuples: Vec<CourseTuple>) -> Result<Vec<ResolvedCourse>> {
    let mut pending = Vec::with_capacity(tuples.len());
    let mut tasks = JoinSet::new();

    for (index, tuple) in tuples.into_iter().enumerate() {
      let course = normalize(&tuple);
      let item = WorkItem { index, policy: self.merge_policy(&tuple.term), course: course.clone() };
      pending.push((course, tuple.term));

      let store = Arc::clone(&self.store);
      let deadline = self.task_timeout;
      tasks.spawn(async move {
        let id = tokio::time::timeout(deadline, resolve_one(&*store, item.policy, &item.course))
          .await
          .map_err(|_| Error::Timeout("course identity resolution"))??;
        Ok::<_, Error>((item.index, id))
      });
    }

    let mut ids: Vec<Option<CourseId>> = vec![None; pending.len()];
    while let Some(joined) = tasks.join_next().await {
      let (index, id) = joined??;
      ids[index] = Some(id);
    }

    debug!(count = pending.len(), "resolved course identities");

    pending
      .into_iter()
      .zip(ids)
      .map(|((course, term), id)| {
        let id = id.ok_or_else(|| Error::InconsistentIdentity(course.key.clone()))?;
        Ok(ResolvedCourse { course: Course::from_new(id, course), term })
      })
      .collect()
  }
}

async fn resolve_one<S: IdentityStore>(
  store: &S,
  policy: MergePolicy,
  course: &NewCourse,
) -> Result<CourseId> {
  match policy {
    MergePolicy::Current => {
      if let Some(id) = store.find_id(&course.key).await.map_err(Error::store)? {
        return Ok(id);
      }
      match store.create(course).await.map_err(Error::store)? {
        CreateOutcome::Created(id) => Ok(id),
        CreateOutcome::Duplicate => {
          debug!(course = %course.key, "lost creation race, re-reading winner");
          store
            .find_id(&course.key)
            .await
            .map_err(Error::store)?
            .ok_or_else(|| Error::InconsistentIdentity(course.key.clone()))
        }
      }
    }
    MergePolicy::Historical => {
      if let Some(id) = store
        .find_id_excluding_unknown(&course.key)
        .await
        .map_err(Error::store)?
      {
        return Ok(id);
      }
      store.upsert(course).await.map_err(Error::store)?;
      store
        .find_id(&course.key)
        .await
        .map_err(Error::store)?
        .ok_or_else(|| Error::InconsistentIdentity(course.key.clone()))
    }
  }
}
