//! Degradation to stored data when the upstream is unreachable, and
//! asynchronous persistence of whatever the live path returns.

use std::{sync::Arc, time::Duration};

use kestack_core::{
  relay::EventRelay,
  store::SubscriptionStore,
  subscription::{CourseSubscription, SubscriptionEvent},
  term::{TermPolicy, Ttl},
};
use tracing::warn;

use crate::{Error, ListRequest, Resolver, Result, relay::publish_detached};

/// Deadline for handing a batch of events to the relay.
pub const DEFAULT_EMIT_TIMEOUT: Duration = Duration::from_secs(1);

pub struct FallbackResolver<R, S, E> {
  inner:        R,
  store:        Arc<S>,
  relay:        Arc<E>,
  policy:       TermPolicy,
  emit_timeout: Duration,
}

impl<R, S, E> FallbackResolver<R, S, E> {
  pub fn new(inner: R, store: Arc<S>, relay: Arc<E>, policy: TermPolicy) -> Self {
    Self { inner, store, relay, policy, emit_timeout: DEFAULT_EMIT_TIMEOUT }
  }

  pub fn with_emit_timeout(mut self, emit_timeout: Duration) -> Self {
    self.emit_timeout = emit_timeout;
    self
  }
}

impl<R, S, E> FallbackResolver<R, S, E>
where
  E: EventRelay + 'static,
{
  /// Queue persistence of every subscription whose term is stable. Terms
  /// still open for enrollment change too often to be worth storing.
  fn emit(&self, subscriptions: &[CourseSubscription]) {
    let events: Vec<SubscriptionEvent> = subscriptions
      .iter()
      .filter(|s| self.policy.is_stable(&s.term))
      .map(CourseSubscription::to_event)
      .collect();
    publish_detached(Arc::clone(&self.relay), events, self.emit_timeout);
  }
}

impl<R, S, E> Resolver for FallbackResolver<R, S, E>
where
  R: Resolver,
  S: SubscriptionStore + 'static,
  E: EventRelay + 'static,
{
  async fn resolve(&self, request: &ListRequest) -> Result<Vec<CourseSubscription>> {
    let uid = request.uid.ok_or(Error::MissingUid)?;

    match self.inner.resolve(request).await {
      Ok(subscriptions) => {
        self.emit(&subscriptions);
        Ok(subscriptions)
      }
      Err(Error::Upstream(e)) if e.is_network() => {
        warn!(uid, term = %request.term, error = %e, "upstream unreachable, serving stored subscriptions");
        let stored = self
          .store
          .find_alive(uid, &request.term, Ttl::Forever)
          .await
          .map_err(Error::store)?;
        if stored.is_empty() {
          return Err(Error::DegradedDataNotFound(request.term.clone()));
        }
        Ok(stored)
      }
      Err(e) => Err(e),
    }
  }
}
