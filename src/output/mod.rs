//! JSON persistence of the merged dataset: one object keyed by course
//! key, each value carrying students, instructor, and TAs.

use crate::models::CourseSet;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use tracing::info;

pub fn write_output(path: &Path, courses: &CourseSet) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create output file {:?}", path))?;
    serde_json::to_writer_pretty(file, courses)
        .with_context(|| format!("Failed to serialize {} courses", courses.len()))?;
    info!("Wrote {} courses to {:?}", courses.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Course, Person, Student};

    #[test]
    fn output_shape_matches_the_boundary() {
        let mut courses = CourseSet::new();
        courses.insert(
            "cmpsc16_smith_jones".into(),
            Course {
                students: vec![Student {
                    name: "Doe Alice".into(),
                    email: "adoe@umail.ucsb.edu".into(),
                    grade: "A".into(),
                }],
                instructor: Some(Person::new("Smith Jones", "sjones@cs.ucsb.edu")),
                tas: vec![Person::new("Bob Doe", "bdoe@cs.ucsb.edu")],
            },
        );

        let json = serde_json::to_value(&courses).unwrap();
        let entry = &json["cmpsc16_smith_jones"];
        assert_eq!(entry["instructor"]["name"], "Smith Jones");
        assert_eq!(entry["students"][0]["email"], "adoe@umail.ucsb.edu");
        assert_eq!(entry["tas"][0]["name"], "Bob Doe");
        // Grades never leave the process.
        assert!(entry["students"][0].get("grade").is_none());
    }

    #[test]
    fn cold_start_courses_omit_instructor() {
        let mut courses = CourseSet::new();
        courses.insert("cmpsc16".into(), Course::default());
        let json = serde_json::to_value(&courses).unwrap();
        assert!(json["cmpsc16"].get("instructor").is_none());
        assert!(json["cmpsc16"].get("tas").is_none());
    }
}
