//! The navigation state machine for the egrades portal.
//!
//! The portal exposes its workflow only through chained WebForms pages:
//! login → role selection → instructor home (quarter dropdown + course
//! table) → per-course gradebook → roster download. Each step's response
//! reissues the anti-forgery tokens the next step must echo, so the walk
//! is strictly sequential. Every step verifies the URL it landed on; a
//! mismatch means the machine desynchronized from the portal and the run
//! aborts rather than producing corrupted data.

pub mod page;
pub mod session;

use crate::config::PortalConfig;
use crate::directory::{resolve_email, EmailLookup};
use crate::error::{PortalError, Result};
use crate::models::{CourseListing, Person, Student};
use crate::prompt::Prompter;
use crate::roster;
use crate::utils::title_case;
use scraper::Html;
use self::session::{Transport, TokenSession, FORM_PREFIX};
use tracing::{debug, info, warn};
use url::Url;

// Instructor-home table layout.
const CELL_INSTRUCTOR: usize = 2;
const CELL_ENROLLMENT: usize = 4;

/// Marker on image-button tokens for co-listed sections already counted
/// under their primary instructor.
const SECONDARY_MARKER: &str = "Secondary";

pub struct CourseCrawler<T: Transport> {
    session: TokenSession<T>,
    url_login: String,
    url_role_selection: String,
    url_instructor: String,
    url_gradebook: String,
    url_download: String,
    active_quarter: Option<String>,
}

impl CourseCrawler<session::HttpTransport> {
    pub fn new(config: &PortalConfig, debug: bool) -> Result<Self> {
        let transport = session::HttpTransport::new(config)?;
        Self::with_transport(&config.base_url, transport, debug)
    }
}

impl<T: Transport> CourseCrawler<T> {
    pub fn with_transport(base_url: &str, transport: T, debug: bool) -> Result<Self> {
        let base = Url::parse(base_url)?;
        Ok(Self {
            session: TokenSession::new(transport, debug),
            url_login: base.join("Login.aspx")?.to_string(),
            url_role_selection: base.join("RoleSelection.aspx")?.to_string(),
            url_instructor: base.join("InstructorMain.aspx")?.to_string(),
            url_gradebook: base.join("Gradebook.aspx")?.to_string(),
            url_download: base.join("ClasslistDownload.aspx")?.to_string(),
            active_quarter: None,
        })
    }

    /// The quarter the crawl is operating on, known once
    /// [`list_courses`](Self::list_courses) has run.
    pub fn active_quarter(&self) -> Option<&str> {
        self.active_quarter.as_deref()
    }

    /// `Start → Authenticated`. Re-prompts for credentials until the portal
    /// redirects away from the login page; a response that stays on the
    /// login URL means the credentials were rejected.
    pub fn login(&mut self, prompter: &mut dyn Prompter) -> Result<()> {
        info!("Connecting to egrades");
        self.session.get(&self.url_login)?;
        loop {
            let (username, password) = prompter.credentials()?;
            let (_, raw) = self.session.post(
                &self.url_login,
                &[
                    ("txtUCSBNetID", username.as_str()),
                    ("txtPassword", password.as_str()),
                    ("btnContinue.?", "0"),
                ],
                true,
            )?;
            if raw.final_url != self.url_login {
                info!("Logged in as {}", username);
                return Ok(());
            }
            warn!("Login failed, try again.");
        }
    }

    /// `Authenticated → Enumerating`: select the proxy role, settle the
    /// active quarter, and enumerate every section with enrolled students.
    pub fn list_courses(
        &mut self,
        quarter: Option<&str>,
        faculty: &dyn EmailLookup,
        prompter: &mut dyn Prompter,
    ) -> Result<Vec<CourseListing>> {
        info!("Downloading class lists...");
        let doc = self.select_role()?;
        let doc = self.confirm_quarter(doc, quarter)?;
        self.enumerate_sections(&doc, faculty, prompter)
    }

    /// Per course: gradebook → download trigger → download action, then
    /// back to instructor home to re-arm the next iteration. A failure
    /// partway through leaves the session authenticated but positioned on
    /// an arbitrary page; the crawl is not restartable mid-list.
    pub fn fetch_roster(
        &mut self,
        listing: &CourseListing,
        save_dir: Option<&std::path::Path>,
        prompter: &mut dyn Prompter,
    ) -> Result<Vec<Student>> {
        let click = format!("{}.?", listing.row_token);
        let (_, raw) = self
            .session
            .post(&self.url_instructor, &[(click.as_str(), "0")], false)?;
        self.session.verify_url(&self.url_gradebook, &raw.final_url)?;

        let (_, raw) = self
            .session
            .post(&self.url_gradebook, &[("btnDownloadGradesTop.?", "0")], false)?;
        self.session.verify_url(&self.url_download, &raw.final_url)?;

        let raw = self
            .session
            .post_raw(&self.url_download, &[("Download.?", "0")], false)?;
        let disposition = raw.content_disposition.ok_or(PortalError::Download)?;

        if let Some(dir) = save_dir {
            self.save_roster(dir, &disposition, &raw.body)?;
        }

        // Restore instructor home so the next section's click target works.
        self.session.get(&self.url_instructor)?;

        roster::parse_students(&raw.body, prompter)
    }

    // ── State transitions ─────────────────────────────────────────────────────

    fn select_role(&mut self) -> Result<Html> {
        let (doc, raw) = self.session.post(
            &self.url_role_selection,
            &[("roleSelectList", "Proxy"), ("continueButton.?", "0")],
            false,
        )?;
        self.session.verify_url(&self.url_instructor, &raw.final_url)?;
        Ok(doc)
    }

    /// Adopt the page's current quarter, or switch to the requested one and
    /// verify the portal stayed on instructor home.
    fn confirm_quarter(&mut self, doc: Html, requested: Option<&str>) -> Result<Html> {
        let current = page::selected_option(&doc)?;
        match requested {
            Some(quarter) if quarter != current => {
                debug!("switching quarter {} -> {}", current, quarter);
                let (doc, raw) = self
                    .session
                    .post(&self.url_instructor, &[("ddlQuarterList", quarter)], false)?;
                self.session.verify_url(&self.url_instructor, &raw.final_url)?;
                self.active_quarter = Some(quarter.to_string());
                Ok(doc)
            }
            _ => {
                self.active_quarter = Some(current);
                Ok(doc)
            }
        }
    }

    fn enumerate_sections(
        &self,
        doc: &Html,
        faculty: &dyn EmailLookup,
        prompter: &mut dyn Prompter,
    ) -> Result<Vec<CourseListing>> {
        let mut listings = Vec::new();
        for button in page::image_inputs(doc) {
            let Some(name) = button.value().attr("name") else {
                continue;
            };
            let Some(token) = name.strip_prefix(FORM_PREFIX) else {
                continue;
            };
            if token.contains(SECONDARY_MARKER) {
                continue;
            }

            let row = page::ancestor_row(button)
                .ok_or_else(|| PortalError::MissingField(format!("row for {}", token)))?;
            let cells = page::row_cells(row);

            if enrolled_count(&cells)? <= 0 {
                debug!("{}: no enrolled students, skipping", token);
                continue;
            }

            let instructor_cell = cells
                .get(CELL_INSTRUCTOR)
                .ok_or_else(|| PortalError::MissingField(format!("instructor cell for {}", token)))?;
            let instructor_name = title_case(instructor_cell);
            let email = resolve_email(faculty, &instructor_name, prompter)?;

            let title = button
                .value()
                .attr("title")
                .ok_or_else(|| PortalError::MissingField(format!("button title for {}", token)))?;
            let course: String = title.split_whitespace().skip(1).take(2).collect();

            listings.push(CourseListing {
                course,
                instructor: Person::new(instructor_name, email),
                row_token: token.to_string(),
            });
        }
        Ok(listings)
    }

    fn save_roster(&self, dir: &std::path::Path, disposition: &str, body: &str) -> Result<()> {
        let filename = disposition
            .split('=')
            .nth(1)
            .map(|f| f.trim_matches('"'))
            .filter(|f| !f.is_empty())
            .ok_or_else(|| PortalError::MissingField("content-disposition filename".into()))?;
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(filename), body)?;
        info!("Saved: {}", filename);
        Ok(())
    }
}

/// Numerator of the `enrolled/capacity` cell.
fn enrolled_count(cells: &[String]) -> Result<i64> {
    let cell = cells
        .get(CELL_ENROLLMENT)
        .ok_or_else(|| PortalError::MissingField("enrollment cell".into()))?;
    cell.split('/')
        .next()
        .unwrap_or_default()
        .trim()
        .parse()
        .map_err(|_| PortalError::MissingField(format!("enrollment count in {:?}", cell)))
}
