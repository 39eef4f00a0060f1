//! Handlers for `/courses` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/courses` | Body: [`CourseListBody`]; legacy list keyed by student id |
//! | `GET`  | `/courses/:id` | Course with its grades |
//! | `GET`  | `/courses/:id/subscribers` | `?cur_uid` cursor (default 0), `?limit` 1..=100 (default 10) |
//! | `GET`  | `/courses/:id/subscribed` | `?uid` required |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use kestack_core::{
  course::{CourseDetail, CourseId, Uid},
  subscription::FailoverCourse,
  term::TermRef,
  upstream::Credentials,
};
use kestack_resolve::{CourseOperations, reader::FIRST_PAGE_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub const MAX_PAGE_SIZE: u32 = 100;

// ─── Legacy list ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CourseListBody {
  pub student_id: String,
  pub password:   String,
  #[serde(default)]
  pub year:       String,
  #[serde(default)]
  pub term:       String,
}

/// `POST /courses`
pub async fn list<T>(
  State(service): State<Arc<T>>,
  Json(body): Json<CourseListBody>,
) -> Result<Json<Vec<FailoverCourse>>, ApiError>
where
  T: CourseOperations,
{
  if body.student_id.is_empty() {
    return Err(ApiError::BadRequest("student_id must not be empty".into()));
  }
  let credentials = Credentials::new(body.student_id, body.password);
  let term = TermRef::new(body.year, body.term);
  Ok(Json(service.list_courses(&credentials, &term).await?))
}

// ─── Detail ──────────────────────────────────────────────────────────────────

/// `GET /courses/:id`
pub async fn detail<T>(
  State(service): State<Arc<T>>,
  Path(id): Path<CourseId>,
) -> Result<Json<CourseDetail>, ApiError>
where
  T: CourseOperations,
{
  Ok(Json(service.course_detail(id).await?))
}

// ─── Subscribers ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubscribersParams {
  #[serde(default)]
  pub cur_uid: Uid,
  pub limit:   Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SubscribersResponse {
  pub uids: Vec<Uid>,
}

/// `GET /courses/:id/subscribers[?cur_uid=...][&limit=...]`
pub async fn subscribers<T>(
  State(service): State<Arc<T>>,
  Path(id): Path<CourseId>,
  Query(params): Query<SubscribersParams>,
) -> Result<Json<SubscribersResponse>, ApiError>
where
  T: CourseOperations,
{
  let limit = params.limit.unwrap_or(FIRST_PAGE_SIZE);
  if limit == 0 || limit > MAX_PAGE_SIZE {
    return Err(ApiError::BadRequest(format!("limit must be between 1 and {MAX_PAGE_SIZE}")));
  }
  let uids = service.subscriber_uids(id, params.cur_uid, limit).await?;
  Ok(Json(SubscribersResponse { uids }))
}

// ─── Subscribed ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubscribedParams {
  pub uid: Uid,
}

#[derive(Debug, Serialize)]
pub struct SubscribedResponse {
  pub subscribed: bool,
}

/// `GET /courses/:id/subscribed?uid=<uid>`
pub async fn subscribed<T>(
  State(service): State<Arc<T>>,
  Path(id): Path<CourseId>,
  Query(params): Query<SubscribedParams>,
) -> Result<Json<SubscribedResponse>, ApiError>
where
  T: CourseOperations,
{
  let subscribed = service.is_subscribed(params.uid, id).await?;
  Ok(Json(SubscribedResponse { subscribed }))
}
