//! Course-subscription resolution for kestack.
//!
//! Turns an upstream course list into stable course identities, and wraps
//! that live path in two decorators sharing the [`Resolver`] contract:
//!
//! ```text
//! FreshnessGate -> FallbackResolver -> LiveResolver -> Upstream
//!       |                 |                  |
//!  SubscriptionStore   EventRelay      IdentityResolver -> IdentityStore
//! ```
//!
//! [`CourseService`] assembles the chain together with the read-through
//! [`CourseReader`] and the legacy [`CourseLister`]. Storage, upstream and
//! relay are all traits from `kestack-core`; this crate never names a
//! concrete backend.

#![allow(async_fn_in_trait)]

pub mod cache;
pub mod courses;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod freshness;
pub mod live;
pub mod normalize;
pub mod reader;
pub mod relay;
pub mod resolver;
pub mod retry;
pub mod service;

#[cfg(test)]
mod testing;

pub use cache::{KvCache, MemoryCache};
pub use courses::CourseLister;
pub use engine::{IdentityResolver, MergePolicy, ResolvedCourse};
pub use error::{Error, ErrorKind, Result};
pub use fallback::FallbackResolver;
pub use freshness::FreshnessGate;
pub use live::LiveResolver;
pub use reader::CourseReader;
pub use relay::{ChannelRelay, Envelope, RelayConsumer, RelayError};
pub use resolver::{ListRequest, Resolver};
pub use retry::RetryingUpstream;
pub use service::{CourseOperations, CourseService, ServiceSettings};
