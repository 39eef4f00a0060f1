//! The event relay contract.
//!
//! The relay is a durable, ordered-per-key, at-least-once channel. The read
//! path publishes to it so that writes never sit on the response's critical
//! path; a consumer drains it into the stores.

use std::future::Future;

use serde::{Serialize, de::DeserializeOwned};

use crate::Result;

/// A message type that can travel over the relay.
pub trait RelayEvent: Serialize + DeserializeOwned + Send + Sync {
  /// Topic the event is published under.
  const TOPIC: &'static str;

  /// Partition key; events sharing a key are delivered in order.
  fn key(&self) -> String;

  fn to_payload(&self) -> Result<Vec<u8>> { Ok(serde_json::to_vec(self)?) }

  fn from_payload(payload: &[u8]) -> Result<Self> { Ok(serde_json::from_slice(payload)?) }
}

/// Producer side of the relay.
pub trait EventRelay: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Publish a batch of events. Either the whole batch is accepted or an
  /// error is returned; consumers must tolerate redelivery.
  fn publish<'a, E: RelayEvent + 'a>(
    &'a self,
    events: &'a [E],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
