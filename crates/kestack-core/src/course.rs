//! Courses, the entity whose identity the resolution pipeline unifies.
//!
//! A course is identified by the immutable `(course_code, name, teacher)`
//! triple. The store assigns each distinct triple exactly one stable
//! [`CourseId`], no matter how many users' course lists mention it.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, term::TermRef};

pub type CourseId = i64;

/// Internal user id.
pub type Uid = i64;

/// Placeholder uid carried by results of anonymous requests.
pub const ANONYMOUS_UID: Uid = 0;

// ─── Property ────────────────────────────────────────────────────────────────

/// Curriculum category of a course.
///
/// `Unknown` is a placeholder: the live selection feed does not classify
/// courses, so a row may be created as `Unknown` and upgraded later. A known
/// property is never downgraded back to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseProperty {
  #[default]
  Unknown,
  GeneralCore,
  GeneralElective,
  GeneralRequired,
  MajorCore,
  MajorElective,
}

impl CourseProperty {
  /// Map the category label the upstream system prints onto the enum.
  pub fn from_label(label: &str) -> Self {
    match label.trim() {
      "通识核心课" => Self::GeneralCore,
      "通识选修课" => Self::GeneralElective,
      "通识必修课" => Self::GeneralRequired,
      "专业主干课程" => Self::MajorCore,
      "个性发展课程" => Self::MajorElective,
      _ => Self::Unknown,
    }
  }

  pub fn is_known(self) -> bool { self != Self::Unknown }

  /// Stable integer code used for storage. `Unknown` is always `0`.
  pub fn code(self) -> i64 {
    match self {
      Self::Unknown => 0,
      Self::GeneralCore => 1,
      Self::GeneralElective => 2,
      Self::GeneralRequired => 3,
      Self::MajorCore => 4,
      Self::MajorElective => 5,
    }
  }

  pub fn from_code(code: i64) -> Result<Self> {
    match code {
      0 => Ok(Self::Unknown),
      1 => Ok(Self::GeneralCore),
      2 => Ok(Self::GeneralElective),
      3 => Ok(Self::GeneralRequired),
      4 => Ok(Self::MajorCore),
      5 => Ok(Self::MajorElective),
      other => Err(Error::UnknownPropertyCode(other)),
    }
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// The globally unique identity triple of a course.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseKey {
  pub course_code: String,
  pub name:        String,
  pub teacher:     String,
}

impl CourseKey {
  pub fn new(
    course_code: impl Into<String>,
    name: impl Into<String>,
    teacher: impl Into<String>,
  ) -> Self {
    Self {
      course_code: course_code.into(),
      name:        name.into(),
      teacher:     teacher.into(),
    }
  }
}

impl std::fmt::Display for CourseKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}/{}/{}", self.course_code, self.name, self.teacher)
  }
}

/// A course as it is about to be written: everything but the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCourse {
  #[serde(flatten)]
  pub key:      CourseKey,
  #[serde(default)]
  pub school:   String,
  #[serde(default)]
  pub property: CourseProperty,
  #[serde(default)]
  pub credit:   f64,
}

impl NewCourse {
  pub fn new(key: CourseKey, property: CourseProperty) -> Self {
    Self { key, school: String::new(), property, credit: 0.0 }
  }
}

/// A persisted course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
  pub id:       CourseId,
  #[serde(flatten)]
  pub key:      CourseKey,
  pub school:   String,
  pub property: CourseProperty,
  pub credit:   f64,
}

impl Course {
  pub fn from_new(id: CourseId, course: NewCourse) -> Self {
    Self {
      id,
      key: course.key,
      school: course.school,
      property: course.property,
      credit: course.credit,
    }
  }
}

// ─── Upstream tuple ──────────────────────────────────────────────────────────

/// One row of a user's course list as reported by the upstream system,
/// before identity resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseTuple {
  #[serde(flatten)]
  pub course:     NewCourse,
  #[serde(flatten)]
  pub term:       TermRef,
  /// Free-text class arrangement. For physical-education courses this embeds
  /// the class-section label.
  #[serde(default)]
  pub class_info: Option<String>,
}

// ─── Grades ──────────────────────────────────────────────────────────────────

/// A user's historical scores for one course in one term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
  pub course_id:   CourseId,
  pub uid:         Uid,
  #[serde(flatten)]
  pub term:        TermRef,
  pub regular:     f64,
  pub final_score: f64,
  pub total:       f64,
}

/// Course detail as served to callers: the course plus every recorded grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseDetail {
  pub course: Course,
  pub grades: Vec<Grade>,
}
