//! Roster extraction from the downloaded gradebook file, plus the
//! cold-start path that rebuilds a course set from rosters saved by an
//! earlier run's `--save`.

use crate::error::Result;
use crate::models::{Course, CourseSet, Student};
use crate::prompt::Prompter;
use crate::utils::title_case;
use std::path::Path;
use tracing::{debug, info, warn};

// Fixed columns of the portal's roster export.
const COL_GRADE: usize = 2;
const COL_FIRST: usize = 4;
const COL_LAST: usize = 5;
const COL_EMAIL: usize = 10;

const WITHDRAWN: &str = "W";

/// Parse a downloaded roster. The first line is a header. Withdrawn
/// students are dropped; a row with no email blocks on the operator once.
/// Output preserves file row order.
pub fn parse_students(data: &str, prompter: &mut dyn Prompter) -> Result<Vec<Student>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data.as_bytes());

    let mut students = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("roster row {}: {}", i + 1, e);
                continue;
            }
        };
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let (Some(last), Some(first), Some(grade), Some(email)) = (
            record.get(COL_LAST),
            record.get(COL_FIRST),
            record.get(COL_GRADE),
            record.get(COL_EMAIL),
        ) else {
            warn!("roster row {}: too few columns ({})", i + 1, record.len());
            continue;
        };

        let name = title_case(format!("{} {}", last, first).trim());
        let grade = grade.trim().to_string();
        if grade == WITHDRAWN {
            debug!("dropping withdrawn student {:?}", name);
            continue;
        }

        let mut email = email.trim().to_string();
        if email.is_empty() {
            email = prompter.unknown_email(&name)?;
        }

        students.push(Student { name, email, grade });
    }
    Ok(students)
}

// ── Cold start from saved rosters ─────────────────────────────────────────────

/// Rebuild a course set from a directory of saved roster files. The course
/// key is the second `_`-separated token of each filename, lowercased;
/// saved rosters carry no instructor, so these records have none.
pub fn load_saved(dir: &Path, prompter: &mut dyn Prompter) -> Result<(CourseSet, Option<String>)> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut courses = CourseSet::new();
    let mut quarter = None;
    for path in &paths {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(key) = filename.split('_').nth(1).map(|k| k.to_lowercase()) else {
            warn!("ignoring {:?}: filename carries no course token", filename);
            continue;
        };
        let data = std::fs::read_to_string(path)?;
        let students = parse_students(&data, prompter)?;
        info!("{}: {} students loaded from {:?}", key, students.len(), filename);
        courses.insert(
            key,
            Course {
                students,
                instructor: None,
                tas: Vec::new(),
            },
        );
        quarter = quarter_from_filename(filename);
    }
    Ok((courses, quarter))
}

/// `W13_CMPSC16_grades.csv` → `20131`; the leading letter encodes the
/// quarter (Winter/Spring/suMmer/Fall → 1/2/3/4).
fn quarter_from_filename(filename: &str) -> Option<String> {
    let token = filename.split('_').next()?;
    if !token.is_char_boundary(1) || token.len() < 2 {
        return None;
    }
    let (season, year) = token.split_at(1);
    let digit = match season {
        "W" => 1,
        "S" => 2,
        "M" => 3,
        "F" => 4,
        _ => return None,
    };
    Some(format!("20{}{}", year, digit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::testing::ScriptedPrompter;

    const HEADER: &str = "Enrl Cd,Perm,Grade,Units,First,Last,A,B,C,D,Email\n";

    #[test]
    fn withdrawn_rows_are_excluded() {
        let data = format!(
            "{}1,1,A,4,Alice,Doe,,,,,adoe@umail.ucsb.edu\n\
             2,2,W,4,Walter,Gone,,,,,wgone@umail.ucsb.edu\n\
             3,3,B+,4,Bob,Smith,,,,,bsmith@umail.ucsb.edu\n",
            HEADER
        );
        let mut prompter = ScriptedPrompter::new();
        let students = parse_students(&data, &mut prompter).unwrap();
        let names: Vec<_> = students.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Doe Alice", "Smith Bob"]);
        assert_eq!(prompter.email_calls, 0);
    }

    #[test]
    fn empty_email_prompts_exactly_once_per_row() {
        let data = format!(
            "{}1,1,A,4,Alice,Doe,,,,,\n\
             2,2,B,4,Bob,Smith,,,,,bsmith@umail.ucsb.edu\n",
            HEADER
        );
        let mut prompter = ScriptedPrompter::with_emails(&["adoe@umail.ucsb.edu"]);
        let students = parse_students(&data, &mut prompter).unwrap();
        assert_eq!(prompter.email_calls, 1);
        assert_eq!(students[0].email, "adoe@umail.ucsb.edu");
        assert_eq!(students[1].email, "bsmith@umail.ucsb.edu");
    }

    #[test]
    fn names_join_last_then_first_and_title_case() {
        let data = format!("{}1,1,A,4,maria elena,DE LA CRUZ,,,,,m@x\n", HEADER);
        let mut prompter = ScriptedPrompter::new();
        let students = parse_students(&data, &mut prompter).unwrap();
        assert_eq!(students[0].name, "De La Cruz Maria Elena");
    }

    #[test]
    fn blank_lines_and_short_rows_are_skipped() {
        let data = format!("{}\n,,,\n1,1,A,4,Alice,Doe,,,,,adoe@x\nshort,row\n", HEADER);
        let mut prompter = ScriptedPrompter::new();
        let students = parse_students(&data, &mut prompter).unwrap();
        assert_eq!(students.len(), 1);
    }

    #[test]
    fn quarter_decodes_from_saved_filename() {
        assert_eq!(quarter_from_filename("W13_CMPSC16_x.csv").as_deref(), Some("20131"));
        assert_eq!(quarter_from_filename("F12_CMPSC160_x.csv").as_deref(), Some("20124"));
        assert_eq!(quarter_from_filename("X13_CMPSC16.csv"), None);
    }
}
