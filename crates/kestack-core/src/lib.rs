//! Course identity, subscription, and term types shared by every kestack
//! crate, plus the contracts for the stores, the upstream student system,
//! and the event relay.
//!
//! Nothing here talks to a database or the network.

// Store and upstream traits use native `async fn`; the futures' `Send`
// bounds are spelled out on the trait methods instead.
#![allow(async_fn_in_trait)]

pub mod course;
pub mod error;
pub mod relay;
pub mod store;
pub mod subscription;
pub mod term;
pub mod upstream;

pub use error::{Error, Result};
