use serde::Serialize;
use std::collections::BTreeMap;

// ── People ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Person {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Person {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: Some(email.into()),
        }
    }
}

/// One enrolled student as parsed from a downloaded roster. The grade is
/// only consulted for the withdrawn filter and never serialized.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Student {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub grade: String,
}

// ── Courses ───────────────────────────────────────────────────────────────────

/// One record per normalized course key. Frozen once merged.
/// `instructor` is absent for rosters loaded from disk, whose filenames
/// carry no instructor information.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Course {
    pub students: Vec<Student>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor: Option<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tas: Vec<Person>,
}

/// The final merged dataset, keyed by `course_instructor` identity.
/// BTreeMap keeps the JSON output deterministic.
pub type CourseSet = BTreeMap<String, Course>;

/// A course section discovered on the instructor-home page, before its
/// roster has been fetched. `row_token` is the image-button control name
/// (minus the form prefix) that navigates to this section's gradebook.
#[derive(Debug, Clone)]
pub struct CourseListing {
    pub course: String,
    pub instructor: Person,
    pub row_token: String,
}
