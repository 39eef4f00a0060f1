//! Handler for `/subscriptions`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/subscriptions` | Body: [`ListBody`]; empty `year`/`term` lists every term |

use std::sync::Arc;

use axum::{Json, extract::State};
use kestack_core::{
  course::Uid,
  subscription::CourseSubscription,
  term::TermRef,
  upstream::Credentials,
};
use kestack_resolve::{CourseOperations, ListRequest};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListBody {
  pub student_id: String,
  pub password:   String,
  #[serde(default)]
  pub year:       String,
  #[serde(default)]
  pub term:       String,
  /// Without a uid the result is fetched live and never stored.
  pub uid:        Option<Uid>,
}

impl From<ListBody> for ListRequest {
  fn from(body: ListBody) -> Self {
    ListRequest {
      credentials: Credentials::new(body.student_id, body.password),
      term:        TermRef::new(body.year, body.term),
      uid:         body.uid,
    }
  }
}

/// `POST /subscriptions`
pub async fn list<T>(
  State(service): State<Arc<T>>,
  Json(body): Json<ListBody>,
) -> Result<Json<Vec<CourseSubscription>>, ApiError>
where
  T: CourseOperations,
{
  if body.student_id.is_empty() {
    return Err(ApiError::BadRequest("student_id must not be empty".into()));
  }
  let request = ListRequest::from(body);
  Ok(Json(service.subscription_list(&request).await?))
}
