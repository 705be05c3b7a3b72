//! 课程标识解析
//!
//! 支持两种格式：`course-v1:ORG+COURSE+RUN` 与旧式 `ORG/COURSE/RUN`。

use crate::error::CoursehubError;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

const NEW_STYLE_PREFIX: &str = "course-v1:";

fn part_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w\-~.:]+$").expect("static regex"))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CourseKey {
    pub org: String,
    pub course: String,
    pub run: String,
    deprecated: bool,
}

impl CourseKey {
    pub fn new(org: &str, course: &str, run: &str) -> Result<Self, CoursehubError> {
        Self::from_parts(org, course, run, false)
            .ok_or_else(|| CoursehubError::InvalidCourseKey(format!("{org}+{course}+{run}")))
    }

    pub fn parse(raw: &str) -> Result<Self, CoursehubError> {
        let invalid = || CoursehubError::InvalidCourseKey(raw.to_string());
        let raw = raw.trim();

        if let Some(rest) = raw.strip_prefix(NEW_STYLE_PREFIX) {
            let mut parts = rest.split('+');
            let (Some(org), Some(course), Some(run), None) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(invalid());
            };
            return Self::from_parts(org, course, run, false).ok_or_else(invalid);
        }

        let mut parts = raw.split('/');
        let (Some(org), Some(course), Some(run), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        Self::from_parts(org, course, run, true).ok_or_else(invalid)
    }

    fn from_parts(org: &str, course: &str, run: &str, deprecated: bool) -> Option<Self> {
        let re = part_regex();
        if [org, course, run].iter().all(|part| re.is_match(part)) {
            Some(Self {
                org: org.to_string(),
                course: course.to_string(),
                run: run.to_string(),
                deprecated,
            })
        } else {
            None
        }
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.deprecated {
            write!(f, "{}/{}/{}", self.org, self.course, self.run)
        } else {
            write!(f, "{}{}+{}+{}", NEW_STYLE_PREFIX, self.org, self.course, self.run)
        }
    }
}

impl FromStr for CourseKey {
    type Err = CoursehubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CourseKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CourseKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_new_style_keys() {
        let key = CourseKey::parse("course-v1:edX+DemoX+2015_T1").unwrap();
        assert_eq!(key.org, "edX");
        assert_eq!(key.course, "DemoX");
        assert_eq!(key.run, "2015_T1");
        assert!(!key.is_deprecated());
        assert_eq!(key.to_string(), "course-v1:edX+DemoX+2015_T1");
    }

    #[test]
    fn parses_slash_separated_keys() {
        let key = CourseKey::parse("edX/DemoX/Demo_Course").unwrap();
        assert!(key.is_deprecated());
        assert_eq!(key.to_string(), "edX/DemoX/Demo_Course");
    }

    #[test]
    fn rejects_malformed_keys() {
        for raw in [
            "invalidcourse",
            "edX/",
            "az-23423-4vs",
            "a/b/c/d",
            "course-v1:a+b",
            "course-v1:a+b+c+d",
            "edX//run",
            "edX/De mo/run",
        ] {
            assert!(
                matches!(CourseKey::parse(raw), Err(CoursehubError::InvalidCourseKey(_))),
                "expected {raw} to be rejected"
            );
        }
    }

    #[test]
    fn serde_uses_string_form() {
        let key = CourseKey::new("test", "test", "test").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"course-v1:test+test+test\"");
        let back: CourseKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
