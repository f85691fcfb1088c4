//! Name → email resolution.
//!
//! Two independent providers share the [`EmailLookup`] contract: faculty
//! emails come from the department schedule page (with a static override
//! table for names the page gets wrong), graduate-student emails from a
//! listing page turned into a map at construction time. Neither provider
//! prompts; when both a directory and its caller come up empty,
//! [`resolve_email`] falls back to the injected [`Prompter`].

use crate::error::{PortalError, Result};
use crate::prompt::Prompter;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

/// Instructors whose schedule-page entries are missing or misleading.
const FACULTY_OVERRIDES: &[(&str, &str)] = &[
    ("Singh A K", "ambuj@cs.ucsb.edu"),
    ("Hardekopf B C", "benh@cs.ucsb.edu"),
    ("Costanzo C", "mikec@cs.ucsb.edu"),
    ("Koc C K", "koc@cs.ucsb.edu"),
    ("Moser L E", "moser@ece.ucsb.edu"),
    ("Buoni M J", "buoni@cs.ucsb.edu"),
    ("Manjunath B S", "manj@ece.ucsb.edu"),
    ("Sen P", "psen@ece.ucsb.edu"),
    ("Tessaro S M", "tessaro@cs.ucsb.edu"),
    ("Kim T", "kim@mat.ucsb.edu"),
];

pub trait EmailLookup {
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Consult a directory, falling back to the operator for a miss. The
/// directory itself is never mutated; the prompt happens here, at the
/// call site, and is the only human touchpoint mid-crawl.
pub fn resolve_email(
    directory: &dyn EmailLookup,
    name: &str,
    prompter: &mut dyn Prompter,
) -> Result<String> {
    match directory.lookup(name) {
        Some(email) => Ok(email),
        None => {
            debug!("no directory entry for {:?}, asking operator", name);
            Ok(prompter.unknown_email(name)?)
        }
    }
}

// ── Faculty ───────────────────────────────────────────────────────────────────

/// Faculty lookup over the department course-schedule page. Anchor hrefs
/// of the form `...cs.ucsb.edu/%7E<user>` yield `<user>@<domain>`.
pub struct FacultyDirectory {
    doc: Html,
    domain: String,
}

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"cs\.ucsb\.edu/%7E(.+)$").unwrap());

impl FacultyDirectory {
    pub fn fetch(url: &str, domain: &str) -> Result<Self> {
        let body = reqwest::blocking::get(url)?.error_for_status()?.text()?;
        Ok(Self::from_html(&body, domain))
    }

    pub fn from_html(html: &str, domain: &str) -> Self {
        Self {
            doc: Html::parse_document(html),
            domain: domain.to_string(),
        }
    }
}

impl EmailLookup for FacultyDirectory {
    fn lookup(&self, name: &str) -> Option<String> {
        if let Some((_, email)) = FACULTY_OVERRIDES.iter().find(|(n, _)| *n == name) {
            return Some(email.to_string());
        }
        let sel = Selector::parse("td a").unwrap();
        for anchor in self.doc.select(&sel) {
            if anchor.text().collect::<String>().trim() != name {
                continue;
            }
            let href = anchor.value().attr("href")?;
            if let Some(caps) = USERNAME_RE.captures(href) {
                return Some(format!("{}@{}", &caps[1], self.domain));
            }
        }
        None
    }
}

// ── Graduate students ─────────────────────────────────────────────────────────

/// Graduate-student lookup, keyed by collapsed `first last` name. Built
/// once from the listing page; construction fails on any two rows that
/// normalize to the same key rather than silently overwriting one.
#[derive(Debug)]
pub struct GradDirectory {
    mapping: HashMap<String, String>,
}

impl GradDirectory {
    pub fn fetch(url: &str) -> Result<Self> {
        let body = reqwest::blocking::get(url)?.error_for_status()?.text()?;
        Self::from_html(&body)
    }

    pub fn from_html(html: &str) -> Result<Self> {
        let doc = Html::parse_document(html);
        let row_sel = Selector::parse("tr").unwrap();
        let th_sel = Selector::parse("th").unwrap();
        let anchor_sel = Selector::parse("td a").unwrap();

        let mut mapping = HashMap::new();
        for row in doc.select(&row_sel) {
            if row.select(&th_sel).next().is_some() {
                continue;
            }
            let Some(anchor) = row.select(&anchor_sel).next() else {
                continue;
            };
            let name = first_last(anchor.text().collect::<String>().trim());
            if name.is_empty() {
                continue;
            }
            let href = anchor.value().attr("href").unwrap_or_default();
            let email = href.strip_prefix("mailto:").unwrap_or(href).to_string();
            if mapping.insert(name.clone(), email).is_some() {
                return Err(PortalError::DirectoryAmbiguity { name });
            }
        }
        Ok(Self { mapping })
    }
}

impl EmailLookup for GradDirectory {
    fn lookup(&self, name: &str) -> Option<String> {
        self.mapping.get(&first_last(name)).cloned()
    }
}

/// Collapse middle names and initials: `"Alice B Carol Doe"` → `"Alice Doe"`.
fn first_last(name: &str) -> String {
    let parts: Vec<&str> = name.split_whitespace().collect();
    match (parts.first(), parts.last()) {
        (Some(first), Some(last)) => format!("{} {}", first, last),
        _ => String::new(),
    }
}
