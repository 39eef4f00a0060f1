//! In-process event relay and its consumer.
//!
//! [`ChannelRelay`] is a bounded channel implementing
//! [`EventRelay`]. [`RelayConsumer`] drains it in batches, decodes each
//! envelope by topic, and writes the result to the stores. Writes are
//! idempotent upserts, so redelivery after a failed batch is harmless.

use std::{future::Future, sync::Arc, time::Duration};

use kestack_core::{
  relay::{EventRelay, RelayEvent},
  store::{FailoverStore, SubscriptionStore},
  subscription::{CourseListEvent, SubscriptionEvent},
};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};

/// Deadline for one persistence attempt of one batch.
pub const PERSIST_TIMEOUT: Duration = Duration::from_secs(2);
pub const PERSIST_ATTEMPTS: u32 = 3;

/// One encoded event in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
  pub topic:   &'static str,
  pub key:     String,
  pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum RelayError {
  #[error("relay channel closed")]
  Closed,

  #[error("failed to encode event: {0}")]
  Encode(#[from] kestack_core::Error),
}

// ─── Producer ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ChannelRelay {
  tx: mpsc::Sender<Envelope>,
}

impl ChannelRelay {
  /// A relay holding at most `capacity` undelivered envelopes, plus the
  /// receiving end to hand to a [`RelayConsumer`].
  pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Envelope>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Self { tx }, rx)
  }
}

impl EventRelay for ChannelRelay {
  type Error = RelayError;

  async fn publish<'a, E: RelayEvent + 'a>(&'a self, events: &'a [E]) -> Result<(), RelayError> {
    // Encode everything first so a bad event rejects the whole batch.
    let envelopes = events
      .iter()
      .map(|event| {
        Ok(Envelope { topic: E::TOPIC, key: event.key(), payload: event.to_payload()? })
      })
      .collect::<Result<Vec<_>, RelayError>>()?;

    for envelope in envelopes {
      self.tx.send(envelope).await.map_err(|_| RelayError::Closed)?;
    }
    Ok(())
  }
}

/// Publish `events` off the caller's critical path.
///
/// The caller never observes the outcome; failures and timeouts are logged.
pub(crate) fn publish_detached<E, V>(relay: Arc<E>, events: Vec<V>, deadline: Duration)
where
  E: EventRelay + 'static,
  V: RelayEvent + 'static,
{
  if events.is_empty() {
    return;
  }
  tokio::spawn(async move {
    let count = events.len();
    match tokio::time::timeout(deadline, relay.publish(&events)).await {
      Ok(Ok(())) => debug!(topic = V::TOPIC, count, "published events"),
      Ok(Err(e)) => error!(topic = V::TOPIC, count, error = %e, "failed to publish events"),
      Err(_) => error!(topic = V::TOPIC, count, "timed out publishing events"),
    }
  });
}

// ─── Consumer ────────────────────────────────────────────────────────────────

pub struct RelayConsumer<S> {
  rx:         mpsc::Receiver<Envelope>,
  store:      Arc<S>,
  batch_size: usize,
}

impl<S> RelayConsumer<S>
where
  S: SubscriptionStore + FailoverStore + 'static,
{
  pub fn new(rx: mpsc::Receiver<Envelope>, store: Arc<S>, batch_size: usize) -> Self {
    Self { rx, store, batch_size: batch_size.max(1) }
  }

  pub fn spawn(self) -> JoinHandle<()> { tokio::spawn(self.run()) }

  /// Drain the relay until every producer has been dropped.
  pub async fn run(mut self) {
    info!(batch_size = self.batch_size, "relay consumer started");
    while let Some(batch) = self.next_batch().await {
      self.consume(batch).await;
    }
    info!("relay consumer stopped");
  }

  /// Wait for one envelope, then take whatever else is already queued.
  async fn next_batch(&mut self) -> Option<Vec<Envelope>> {
    let first = self.rx.recv().await?;
    let mut batch = vec![first];
    while batch.len() < self.batch_size {
      match self.rx.try_recv() {
        Ok(envelope) => batch.push(envelope),
        Err(_) => break,
      }
    }
    Some(batch)
  }

  async fn consume(&self, batch: Vec<Envelope>) {
    let mut subscriptions = Vec::new();
    let mut failover = Vec::new();

    for envelope in batch {
      match envelope.topic {
        t if t == SubscriptionEvent::TOPIC => match SubscriptionEvent::from_payload(&envelope.payload) {
          Ok(event) => subscriptions.push(event),
          Err(e) => error!(key = %envelope.key, error = %e, "dropping undecodable subscription event"),
        },
        t if t == CourseListEvent::TOPIC => match CourseListEvent::from_payload(&envelope.payload) {
          Ok(event) => failover.extend(event.courses),
          Err(e) => error!(key = %envelope.key, error = %e, "dropping undecodable course list event"),
        },
        other => warn!(topic = other, key = %envelope.key, "dropping event for unknown topic"),
      }
    }

    let store = &*self.store;
    if !subscriptions.is_empty() {
      let events = &subscriptions;
      persist("subscriptions", events.len(), move || store.upsert_subscriptions(events)).await;
    }
    if !failover.is_empty() {
      let rows = &failover;
      persist("failover courses", rows.len(), move || store.append(rows)).await;
    }
  }
}

async fn persist<F, Fut, E>(what: &'static str, count: usize, mut write: F)
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<(), E>>,
  E: std::fmt::Display,
{
  for attempt in 1..=PERSIST_ATTEMPTS {
    match tokio::time::timeout(PERSIST_TIMEOUT, write()).await {
      Ok(Ok(())) => {
        debug!(what, count, "persisted relay batch");
        return;
      }
      Ok(Err(e)) => warn!(what, count, attempt, error = %e, "failed to persist relay batch"),
      Err(_) => warn!(what, count, attempt, "timed out persisting relay batch"),
    }
  }
  error!(what, count, "giving up on relay batch");
}
