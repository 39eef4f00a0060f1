//! The contract shared by every stage of the subscription pipeline.

use std::future::Future;

use kestack_core::{
  course::Uid,
  subscription::CourseSubscription,
  term::TermRef,
  upstream::Credentials,
};

use crate::Result;

/// A request for one user's course subscriptions.
#[derive(Debug, Clone)]
pub struct ListRequest {
  pub credentials: Credentials,
  /// The wildcard term asks for every term at once.
  pub term:        TermRef,
  /// Internal user id. Anonymous requests skip storage entirely.
  pub uid:         Option<Uid>,
}

impl ListRequest {
  pub fn new(credentials: Credentials, term: TermRef) -> Self {
    Self { credentials, term, uid: None }
  }

  pub fn with_uid(mut self, uid: Uid) -> Self {
    self.uid = Some(uid);
    self
  }
}

/// Anything that can answer a [`ListRequest`].
///
/// Stages wrap each other: each decorator holds an inner `Resolver` and adds
/// one concern around it.
pub trait Resolver: Send + Sync {
  fn resolve<'a>(
    &'a self,
    request: &'a ListRequest,
  ) -> impl Future<Output = Result<Vec<CourseSubscription>>> + Send + 'a;
}
