//! The service facade: one object answering every course operation.

use std::{future::Future, sync::Arc, time::Duration};

use kestack_core::{
  course::{CourseDetail, CourseId, Uid},
  relay::EventRelay,
  store::{FailoverStore, GradeStore, IdentityStore, SubscriptionStore},
  subscription::{CourseSubscription, FailoverCourse},
  term::{TermPolicy, TermRef, Ttl},
  upstream::{Credentials, Upstream},
};

use crate::{
  CourseLister, CourseReader, FallbackResolver, FreshnessGate, IdentityResolver, KvCache,
  ListRequest, LiveResolver, Resolver, Result, engine::DEFAULT_TASK_TIMEOUT,
  fallback::DEFAULT_EMIT_TIMEOUT,
  reader::{DEFAULT_DETAIL_TTL, DEFAULT_FIRST_PAGE_TTL},
};

/// Everything the API layer can ask of the service.
pub trait CourseOperations: Send + Sync {
  /// Resolve a user's subscriptions. With a uid the request goes through
  /// the freshness gate and fallback; without one, straight to the upstream.
  fn subscription_list<'a>(
    &'a self,
    request: &'a ListRequest,
  ) -> impl Future<Output = Result<Vec<CourseSubscription>>> + Send + 'a;

  /// The legacy course list keyed by student id.
  fn list_courses<'a>(
    &'a self,
    credentials: &'a Credentials,
    term: &'a TermRef,
  ) -> impl Future<Output = Result<Vec<FailoverCourse>>> + Send + 'a;

  fn course_detail(&self, id: CourseId) -> impl Future<Output = Result<CourseDetail>> + Send + '_;

  fn subscriber_uids(
    &self,
    course_id: CourseId,
    cur_uid: Uid,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<Uid>>> + Send + '_;

  fn is_subscribed(&self, uid: Uid, course_id: CourseId) -> impl Future<Output = Result<bool>> + Send + '_;
}

/// Tunables for [`CourseService`].
#[derive(Debug, Clone)]
pub struct ServiceSettings {
  pub policy:         TermPolicy,
  /// How long a stored subscription is served without asking the upstream.
  pub course_ttl:     Ttl,
  pub task_timeout:   Duration,
  pub emit_timeout:   Duration,
  pub first_page_ttl: Duration,
  pub detail_ttl:     Duration,
}

impl ServiceSettings {
  pub fn new(policy: TermPolicy, course_ttl: Ttl) -> Self {
    Self {
      policy,
      course_ttl,
      task_timeout: DEFAULT_TASK_TIMEOUT,
      emit_timeout: DEFAULT_EMIT_TIMEOUT,
      first_page_ttl: DEFAULT_FIRST_PAGE_TTL,
      detail_ttl: DEFAULT_DETAIL_TTL,
    }
  }
}

type ResilientChain<U, S, E> = FreshnessGate<FallbackResolver<LiveResolver<U, S>, S, E>, S>;

pub struct CourseService<U, S, E, C> {
  resilient: ResilientChain<U, S, E>,
  direct:    LiveResolver<U, S>,
  lister:    CourseLister<U, S, E>,
  reader:    CourseReader<S, C>,
}

impl<U, S, E, C> CourseService<U, S, E, C>
where
  U: Upstream + 'static,
  S: IdentityStore + SubscriptionStore + GradeStore + FailoverStore + 'static,
  E: EventRelay + 'static,
  C: KvCache + 'static,
{
  pub fn new(upstream: Arc<U>, store: Arc<S>, relay: Arc<E>, cache: Arc<C>, settings: ServiceSettings) -> Self {
    let ServiceSettings { policy, course_ttl, task_timeout, emit_timeout, first_page_ttl, detail_ttl } =
      settings;

    let identities =
      IdentityResolver::new(Arc::clone(&store), policy.clone()).with_task_timeout(task_timeout);
    let direct = LiveResolver::new(Arc::clone(&upstream), identities);
    let fallback =
      FallbackResolver::new(direct.clone(), Arc::clone(&store), Arc::clone(&relay), policy.clone())
        .with_emit_timeout(emit_timeout);
    let resilient = FreshnessGate::new(fallback, Arc::clone(&store), policy.clone(), course_ttl);
    let lister = CourseLister::new(upstream, Arc::clone(&store), relay, policy).with_emit_timeout(emit_timeout);
    let reader = CourseReader::new(store, cache).with_ttls(first_page_ttl, detail_ttl);

    Self { resilient, direct, lister, reader }
  }
}

impl<U, S, E, C> CourseOperations for CourseService<U, S, E, C>
where
  U: Upstream + 'static,
  S: IdentityStore + SubscriptionStore + GradeStore + FailoverStore + 'static,
  E: EventRelay + 'static,
  C: KvCache + 'static,
{
  async fn subscription_list(&self, request: &ListRequest) -> Result<Vec<CourseSubscription>> {
    if request.uid.is_some() {
      self.resilient.resolve(request).await
    } else {
      self.direct.resolve(request).await
    }
  }

  async fn list_courses(&self, credentials: &Credentials, term: &TermRef) -> Result<Vec<FailoverCourse>> {
    self.lister.list(credentials, term).await
  }

  async fn course_detail(&self, id: CourseId) -> Result<CourseDetail> { self.reader.course_detail(id).await }

  async fn subscriber_uids(&self, course_id: CourseId, cur_uid: Uid, limit: u32) -> Result<Vec<Uid>> {
    self.reader.subscriber_uids(course_id, cur_uid, limit).await
  }

  async fn is_subscribed(&self, uid: Uid, course_id: CourseId) -> Result<bool> {
    self.reader.is_subscribed(uid, course_id).await
  }
}
