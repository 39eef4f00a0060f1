//! Upstream course-name normalisation.
//!
//! Physical-education courses share one `(code, name, teacher)` triple
//! across every sport section, so the section label from the class
//! arrangement is folded into the name before identity resolution.

use kestack_core::course::{CourseTuple, NewCourse};

const PE_MARKER: &str = "体育";
const LABEL_SEPARATOR: char = '：';

/// The course to resolve for `tuple`, with the PE section label applied.
pub fn normalize(tuple: &CourseTuple) -> NewCourse {
  let mut course = tuple.course.clone();
  if course.key.name.contains(PE_MARKER)
    && let Some(label) = tuple.class_info.as_deref().and_then(section_label)
  {
    course.key.name = format!("{}-{label}", course.key.name);
  }
  course
}

/// Extract the section label from a class-arrangement string.
///
/// Prefers the text after the last full-width colon; otherwise the first
/// whitespace-separated token containing no decimal digit, with any stray
/// separator trimmed. `None` when neither yields anything.
pub fn section_label(info: &str) -> Option<&str> {
  if let Some((_, tail)) = info.rsplit_once(LABEL_SEPARATOR) {
    let tail = tail.trim();
    if !tail.is_empty() {
      return Some(tail);
    }
  }
  info
    .split_whitespace()
    .map(|token| token.trim_matches(LABEL_SEPARATOR))
    .find(|token| !token.is_empty() && !token.chars().any(is_decimal_digit))
}

/// ASCII and full-width decimal digits. Roman numerals and circled numbers
/// are part of a label, not a schedule.
fn is_decimal_digit(c: char) -> bool { c.is_ascii_digit() || ('０'..='９').contains(&c) }

#[cfg(test)]
mod tests {
  use kestack_core::{
    course::{CourseKey, CourseProperty},
    term::TermRef,
  };

  use super::*;

  fn tuple(name: &str, class_info: Option<&str>) -> CourseTuple {
    CourseTuple {
      course:     NewCourse::new(CourseKey::new("PE101", name, "Zhao"), CourseProperty::Unknown),
      term:       TermRef::new("2024", "1"),
      class_info: class_info.map(str::to_owned),
    }
  }

  #[test]
  fn label_after_full_width_colon() {
    assert_eq!(section_label("体育项目：篮球"), Some("篮球"));
    assert_eq!(section_label("a：b：  排球 "), Some("排球"));
    assert_eq!(section_label("项目： 网球"), Some("网球"));
  }

  #[test]
  fn label_from_first_token_without_digits() {
    assert_eq!(section_label("星期一第3-4节{1-16周} 羽毛球 东区"), Some("羽毛球"));
    // Empty tail after the colon falls back to tokens.
    assert_eq!(section_label("周2 游泳："), Some("游泳"));
    assert_eq!(section_label("周２ 武术："), Some("武术"));
  }

  #[test]
  fn numeral_symbols_stay_in_labels() {
    assert_eq!(section_label("周2 篮球Ⅱ"), Some("篮球Ⅱ"));
    assert_eq!(section_label("第３节 ①班"), Some("①班"));
    assert_eq!(section_label("第３节 １班"), None);
  }

  #[test]
  fn no_label_available() {
    assert_eq!(section_label("1-16 3-4"), None);
    assert_eq!(section_label(""), None);
  }

  #[test]
  fn pe_name_gets_section_suffix() {
    let course = normalize(&tuple("大学体育(3)", Some("专项：足球")));
    assert_eq!(course.key.name, "大学体育(3)-足球");
    assert_eq!(course.key.course_code, "PE101");
  }

  #[test]
  fn other_courses_are_untouched() {
    let course = normalize(&tuple("Linear Algebra", Some("专项：足球")));
    assert_eq!(course.key.name, "Linear Algebra");

    let course = normalize(&tuple("大学体育(1)", None));
    assert_eq!(course.key.name, "大学体育(1)");

    let course = normalize(&tuple("大学体育(1)", Some("12 34")));
    assert_eq!(course.key.name, "大学体育(1)");
  }
}
