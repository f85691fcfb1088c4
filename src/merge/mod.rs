//! Course-key normalization and the three-source merge: crawled courses,
//! directory lookups, and the manually maintained TA spreadsheet all join
//! on the `course_instructor` key produced here.

use crate::directory::{resolve_email, EmailLookup};
use crate::error::Result;
use crate::models::{Course, CourseSet, Person, Student};
use crate::prompt::Prompter;
use crate::utils::title_case;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{info, warn};

// TA spreadsheet columns; TA names repeat from COL_TA onward.
const COL_COURSE: usize = 0;
const COL_INSTRUCTOR: usize = 1;
const COL_TA: usize = 2;

static TA_NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z -]+$").unwrap());

/// Canonical `course_instructor` identity. A second name token longer than
/// one character counts as part of a two-part surname; a single initial
/// does not. Both the crawl and the TA spreadsheet must key through here
/// or the join silently misses.
///
/// `("cmpsc16", "Smith Jones")` → `cmpsc16_smith_jones`
/// `("cmpsc16", "Smith J")` → `cmpsc16_smith`
pub fn course_key(course: &str, instructor: &str) -> String {
    let parts: Vec<&str> = instructor.split_whitespace().collect();
    let surname = match parts.as_slice() {
        [first, second, ..] if second.len() > 1 => format!("{}_{}", first, second),
        [first, ..] => first.to_string(),
        [] => String::new(),
    };
    format!("{}_{}", course.to_lowercase(), surname.to_lowercase())
}

/// Insert one crawled course under its normalized key.
pub fn insert_course(
    courses: &mut CourseSet,
    course: &str,
    instructor: Person,
    students: Vec<Student>,
) {
    let key = course_key(course, &instructor.name);
    info!("{}: {} students", key, students.len());
    courses.insert(
        key,
        Course {
            students,
            instructor: Some(instructor),
            tas: Vec::new(),
        },
    );
}

/// Fold the TA spreadsheet into an existing course set. Rows whose derived
/// key is unknown are warned about and discarded; entries that are not
/// plain names, or that are readers rather than TAs, are skipped.
pub fn merge_tas<R: std::io::Read>(
    spreadsheet: R,
    courses: &mut CourseSet,
    grads: &dyn EmailLookup,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(spreadsheet);

    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("TA spreadsheet: {}", e);
                continue;
            }
        };
        let course_field = record.get(COL_COURSE).unwrap_or("").trim();
        if !course_field.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        let instructor = title_case(record.get(COL_INSTRUCTOR).unwrap_or("").trim());
        let course = format!("cmpsc{}", course_field).to_lowercase();
        let key = course_key(&course, &instructor);
        let Some(entry) = courses.get_mut(&key) else {
            warn!("Ignoring course {:?}", course);
            continue;
        };

        let mut tas = Vec::new();
        for item in record.iter().skip(COL_TA) {
            let name = item.trim();
            if name.is_empty() {
                continue;
            }
            if name.to_lowercase().contains("reader") || !TA_NAME_RE.is_match(name) {
                warn!("Skipping {:?} for {:?}", name, course);
                continue;
            }
            let email = resolve_email(grads, name, prompter)?;
            tas.push(Person::new(name, email));
        }
        entry.tas = tas;
    }
    Ok(())
}
