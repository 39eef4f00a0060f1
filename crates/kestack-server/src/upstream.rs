//! HTTP adapter for the upstream student-information gateway.
//!
//! The gateway exposes one endpoint, `POST {base_url}/course-list`, which
//! logs in with the student's credentials and returns the course list of
//! the requested feed.

use std::time::Duration;

use kestack_core::{
  course::{CourseKey, CourseProperty, CourseTuple, NewCourse},
  term::TermRef,
  upstream::{Credentials, FeedSource, Upstream, UpstreamError},
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct CourseListRequest<'a> {
  student_id: &'a str,
  password:   &'a str,
  year:       &'a str,
  term:       &'a str,
  source:     FeedSource,
}

/// One course as the gateway reports it. `property` is the upstream's
/// category label, not our enum.
#[derive(Debug, Deserialize)]
struct WireCourse {
  course_code: String,
  name:        String,
  teacher:     String,
  #[serde(default)]
  school:      String,
  #[serde(default)]
  property:    String,
  #[serde(default)]
  credit:      f64,
  year:        String,
  term:        String,
  #[serde(default)]
  class_info:  Option<String>,
}

impl From<WireCourse> for CourseTuple {
  fn from(w: WireCourse) -> Self {
    CourseTuple {
      course:     NewCourse {
        key:      CourseKey::new(w.course_code, w.name, w.teacher),
        school:   w.school,
        property: CourseProperty::from_label(&w.property),
        credit:   w.credit,
      },
      term:       TermRef::new(w.year, w.term),
      class_info: w.class_info.filter(|info| !info.is_empty()),
    }
  }
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpUpstream {
  client:   Client,
  base_url: String,
}

impl HttpUpstream {
  pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, base_url: base_url.trim_end_matches('/').to_owned() })
  }

  fn url(&self, path: &str) -> String { format!("{}{path}", self.base_url) }
}

/// Transport failures that mean "the upstream could not be reached".
fn classify_transport(e: reqwest::Error) -> UpstreamError {
  if e.is_connect() || e.is_timeout() {
    UpstreamError::network(e.to_string())
  } else {
    UpstreamError::other(e.to_string())
  }
}

/// Non-success statuses. Gateway errors mean the gateway could not reach
/// the student system behind it, which counts as unreachable.
fn classify_status(status: StatusCode) -> UpstreamError {
  match status {
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
      UpstreamError::auth_rejected(format!("upstream returned {status}"))
    }
    StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
      UpstreamError::network(format!("upstream returned {status}"))
    }
    _ => UpstreamError::other(format!("upstream returned {status}")),
  }
}

impl Upstream for HttpUpstream {
  async fn fetch_course_list(
    &self,
    credentials: &Credentials,
    term: &TermRef,
    source: FeedSource,
  ) -> Result<Vec<CourseTuple>, UpstreamError> {
    let body = CourseListRequest {
      student_id: &credentials.student_id,
      password: &credentials.password,
      year: &term.year,
      term: &term.term,
      source,
    };
    let resp = self
      .client
      .post(self.url("/course-list"))
      .json(&body)
      .send()
      .await
      .map_err(classify_transport)?;

    if !resp.status().is_success() {
      return Err(classify_status(resp.status()));
    }
    let courses: Vec<WireCourse> = resp.json().await.map_err(classify_transport)?;
    Ok(courses.into_iter().map(CourseTuple::from).collect())
  }
}
