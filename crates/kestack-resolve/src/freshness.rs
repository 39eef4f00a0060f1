//! Serve recently confirmed subscriptions from the store instead of
//! calling the upstream.

use std::sync::Arc;

use kestack_core::{
  store::SubscriptionStore,
  subscription::CourseSubscription,
  term::{TermPolicy, Ttl},
};
use tracing::{debug, warn};

use crate::{ListRequest, Resolver, Result};

/// Short-circuits requests for stable terms when the store holds rows
/// younger than `ttl`. Anything else, including a store failure, falls
/// through to the inner stage.
pub struct FreshnessGate<R, S> {
  inner:  R,
  store:  Arc<S>,
  policy: TermPolicy,
  ttl:    Ttl,
}

impl<R, S> FreshnessGate<R, S> {
  pub fn new(inner: R, store: Arc<S>, policy: TermPolicy, ttl: Ttl) -> Self {
    Self { inner, store, policy, ttl }
  }
}

impl<R, S> Resolver for FreshnessGate<R, S>
where
  R: Resolver,
  S: SubscriptionStore + 'static,
{
  async fn resolve(&self, request: &ListRequest) -> Result<Vec<CourseSubscription>> {
    if let Some(uid) = request.uid
      && !request.term.is_wildcard()
      && self.policy.is_stable(&request.term)
    {
      match self.store.find_alive(uid, &request.term, self.ttl).await {
        Ok(stored) if !stored.is_empty() => {
          debug!(uid, term = %request.term, count = stored.len(), "serving fresh stored subscriptions");
          return Ok(stored);
        }
        Ok(_) => {}
        Err(e) => warn!(uid, term = %request.term, error = %e, "failed to read stored subscriptions"),
      }
    }
    self.inner.resolve(request).await
  }
}
