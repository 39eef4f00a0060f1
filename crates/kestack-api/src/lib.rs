//! JSON REST API for kestack.
//!
//! Exposes an axum [`Router`] backed by any
//! [`kestack_resolve::CourseOperations`]. TLS and transport concerns are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", kestack_api::api_router(service.clone()))
//! ```

pub mod courses;
pub mod error;
pub mod subscriptions;


use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use kestack_resolve::CourseOperations;

pub use error::ApiError;

/// Build a fully-materialised API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<T>(service: Arc<T>) -> Router<()>
where
  T: CourseOperations + 'static,
{
  Router::new()
    // Subscriptions
    .route("/subscriptions", post(subscriptions::list::<T>))
    // Courses
    .route("/courses", post(courses::list::<T>))
    .route("/courses/{id}", get(courses::detail::<T>))
    .route("/courses/{id}/subscribers", get(courses::subscribers::<T>))
    .route("/courses/{id}/subscribed", get(courses::subscribed::<T>))
    .with_state(service)
}
