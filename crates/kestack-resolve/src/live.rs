//! The innermost stage: fetch from the upstream and resolve identities.

use std::sync::Arc;

use chrono::Utc;
use kestack_core::{
  course::ANONYMOUS_UID,
  store::IdentityStore,
  subscription::CourseSubscription,
  upstream::Upstream,
};
use tracing::debug;

use crate::{IdentityResolver, ListRequest, Resolver, Result};

pub struct LiveResolver<U, S> {
  upstream:   Arc<U>,
  identities: IdentityResolver<S>,
}

impl<U, S> Clone for LiveResolver<U, S> {
  fn clone(&self) -> Self {
    Self { upstream: Arc::clone(&self.upstream), identities: self.identities.clone() }
  }
}

impl<U, S> LiveResolver<U, S> {
  pub fn new(upstream: Arc<U>, identities: IdentityResolver<S>) -> Self {
    Self { upstream, identities }
  }
}

impl<U, S> Resolver for LiveResolver<U, S>
where
  U: Upstream + 'static,
  S: IdentityStore + 'static,
{
  async fn resolve(&self, request: &ListRequest) -> Result<Vec<CourseSubscription>> {
    let source = self.identities.policy().feed_for(&request.term);
    let tuples = self
      .upstream
      .fetch_course_list(&request.credentials, &request.term, source)
      .await?;
    let observed_at = Utc::now();
    debug!(term = %request.term, ?source, count = tuples.len(), "fetched upstream course list");

    let uid = request.uid.unwrap_or(ANONYMOUS_UID);
    let resolved = self.identities.resolve_all(tuples).await?;
    Ok(
      resolved
        .into_iter()
        .map(|r| CourseSubscription { course: r.course, uid, term: r.term, updated_at: observed_at })
        .collect(),
    )
  }
}
