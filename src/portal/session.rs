//! Token-carrying HTTP session.
//!
//! The portal is a classic ASP.NET WebForms app: every page embeds a
//! `__VIEWSTATE` / `__EVENTVALIDATION` pair that must be echoed back on the
//! next POST, and every response reissues both. The session owns that pair
//! (and the cookie jar, inside the client) and is the only thing allowed to
//! mutate it. Requests must therefore run strictly one at a time, in order.

use crate::config::PortalConfig;
use crate::error::{PortalError, Result};
use crate::portal::page;
use scraper::Html;
use tracing::debug;

/// Every caller-supplied form field is rewritten under this control prefix.
pub const FORM_PREFIX: &str = "ctl00$pageContent$";

/// Field-name suffix marking an image-button click target; expanded into
/// `.x` / `.y` coordinate fields.
pub const COORD_SUFFIX: &str = ".?";

const VIEW_STATE_ID: &str = "__VIEWSTATE";
const EVENT_VALIDATION_ID: &str = "__EVENTVALIDATION";

// ── Transport ─────────────────────────────────────────────────────────────────

/// A fully materialized HTTP exchange, after redirects.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub final_url: String,
    pub status: u16,
    pub content_disposition: Option<String>,
    pub body: String,
}

/// The wire seam. One production impl over `reqwest::blocking`; tests
/// script this trait instead of running a portal.
pub trait Transport {
    fn get(&mut self, url: &str) -> Result<RawResponse>;
    fn post(&mut self, url: &str, form: &[(String, String)]) -> Result<RawResponse>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(config: &PortalConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self { client })
    }

    fn materialize(resp: reqwest::blocking::Response) -> Result<RawResponse> {
        let final_url = resp.url().to_string();
        let status = resp.status().as_u16();
        let content_disposition = resp
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = resp.text()?;
        Ok(RawResponse {
            final_url,
            status,
            content_disposition,
            body,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&mut self, url: &str) -> Result<RawResponse> {
        Self::materialize(self.client.get(url).send()?)
    }

    fn post(&mut self, url: &str, form: &[(String, String)]) -> Result<RawResponse> {
        Self::materialize(self.client.post(url).form(form).send()?)
    }
}

// ── TokenSession ──────────────────────────────────────────────────────────────

/// Owns the anti-forgery token pair across a crawl. Exactly one per run;
/// updated in place after every exchange and never persisted.
pub struct TokenSession<T: Transport> {
    transport: T,
    view_state: String,
    event_validation: String,
    debug: bool,
}

impl<T: Transport> TokenSession<T> {
    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    pub fn new(transport: T, debug: bool) -> Self {
        Self {
            transport,
            view_state: String::new(),
            event_validation: String::new(),
            debug,
        }
    }

    /// GET a page; refresh the token pair from it.
    pub fn get(&mut self, url: &str) -> Result<(Html, RawResponse)> {
        debug!("GET {}", url);
        let raw = self.transport.get(url)?;
        self.check_status(url, &raw)?;
        let doc = self.refresh_tokens(&raw)?;
        Ok((doc, raw))
    }

    /// POST a form; refresh the token pair from the resulting page. The
    /// body carries the two most recently observed tokens plus every
    /// caller field rewritten under [`FORM_PREFIX`]; a name ending in
    /// [`COORD_SUFFIX`] expands to `.x`/`.y` click coordinates.
    pub fn post(
        &mut self,
        url: &str,
        fields: &[(&str, &str)],
        sensitive: bool,
    ) -> Result<(Html, RawResponse)> {
        let raw = self.post_raw(url, fields, sensitive)?;
        let doc = self.refresh_tokens(&raw)?;
        Ok((doc, raw))
    }

    /// POST without treating the response as a page: no parsing, no token
    /// refresh. Used for the roster download, whose response is a file.
    pub fn post_raw(
        &mut self,
        url: &str,
        fields: &[(&str, &str)],
        sensitive: bool,
    ) -> Result<RawResponse> {
        let form = self.build_form(fields);
        if self.debug && sensitive {
            debug!("POST {} (form hidden)", url);
        } else if self.debug {
            debug!("POST {} {:?}", url, form);
        } else {
            debug!("POST {}", url);
        }
        let raw = self.transport.post(url, &form)?;
        self.check_status(url, &raw)?;
        Ok(raw)
    }

    /// Fail when a response landed somewhere other than the page the next
    /// step requires. This is how a silently failed step (rejected login,
    /// wrong quarter, bad click target) surfaces instead of corrupting
    /// downstream state.
    pub fn verify_url(&self, expected: &str, found: &str) -> Result<()> {
        if expected != found {
            return Err(PortalError::Navigation {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        Ok(())
    }

    fn build_form(&self, fields: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut form = vec![
            (VIEW_STATE_ID.to_string(), self.view_state.clone()),
            (EVENT_VALIDATION_ID.to_string(), self.event_validation.clone()),
        ];
        for (name, value) in fields {
            if let Some(stem) = name.strip_suffix(COORD_SUFFIX) {
                form.push((format!("{}{}.x", FORM_PREFIX, stem), value.to_string()));
                form.push((format!("{}{}.y", FORM_PREFIX, stem), value.to_string()));
            } else {
                form.push((format!("{}{}", FORM_PREFIX, name), value.to_string()));
            }
        }
        form
    }

    fn check_status(&self, url: &str, raw: &RawResponse) -> Result<()> {
        if !(200..300).contains(&raw.status) {
            return Err(PortalError::Transport {
                status: raw.status,
                url: url.to_string(),
            });
        }
        Ok(())
    }

    /// Overwrite the session tokens from a full page response. Every later
    /// request uses these values, regardless of which logical step it
    /// belongs to.
    fn refresh_tokens(&mut self, raw: &RawResponse) -> Result<Html> {
        let doc = Html::parse_document(&raw.body);
        self.view_state = page::input_value(&doc, VIEW_STATE_ID)?;
        self.event_validation = page::input_value(&doc, EVENT_VALIDATION_ID)?;
        Ok(doc)
    }
}

// ── Test transport ────────────────────────────────────────────────────────────

#[cfg(test)]
pub mod testing {
    use super::{RawResponse, Transport};
    use crate::error::Result;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Recorded {
        Get { url: String },
        Post { url: String, form: Vec<(String, String)> },
    }

    /// Scripted portal: returns queued responses in order and records every
    /// request it sees.
    pub struct ScriptedTransport {
        responses: VecDeque<RawResponse>,
        pub requests: Vec<Recorded>,
    }

    impl ScriptedTransport {
        pub fn new(responses: Vec<RawResponse>) -> Self {
            Self {
                responses: responses.into(),
                requests: Vec::new(),
            }
        }

        fn next_response(&mut self) -> RawResponse {
            self.responses
                .pop_front()
                .expect("scripted transport ran out of responses")
        }
    }

    /// A minimal full portal page carrying the given token pair.
    pub fn page_with_tokens(url: &str, view_state: &str, event_validation: &str) -> RawResponse {
        page_with_tokens_and_body(url, view_state, event_validation, "")
    }

    pub fn page_with_tokens_and_body(
        url: &str,
        view_state: &str,
        event_validation: &str,
        extra_body: &str,
    ) -> RawResponse {
        RawResponse {
            final_url: url.to_string(),
            status: 200,
            content_disposition: None,
            body: format!(
                r#"<html><body><form>
                <input type="hidden" id="__VIEWSTATE" value="{}"/>
                <input type="hidden" id="__EVENTVALIDATION" value="{}"/>
                {}</form></body></html>"#,
                view_state, event_validation, extra_body
            ),
        }
    }

    impl Transport for ScriptedTransport {
        fn get(&mut self, url: &str) -> Result<RawResponse> {
            self.requests.push(Recorded::Get { url: url.to_string() });
            Ok(self.next_response())
        }

        fn post(&mut self, url: &str, form: &[(String, String)]) -> Result<RawResponse> {
            self.requests.push(Recorded::Post {
                url: url.to_string(),
                form: form.to_vec(),
            });
            Ok(self.next_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{page_with_tokens, Recorded, ScriptedTransport};
    use super::*;

    fn form_value(requests: &[Recorded], idx: usize, field: &str) -> Option<String> {
        match &requests[idx] {
            Recorded::Post { form, .. } => form
                .iter()
                .find(|(name, _)| name == field)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    #[test]
    fn tokens_from_each_response_ride_the_next_post() {
        let transport = ScriptedTransport::new(vec![
            page_with_tokens("https://portal/Login.aspx", "vs1", "ev1"),
            page_with_tokens("https://portal/Home.aspx", "vs2", "ev2"),
            page_with_tokens("https://portal/Other.aspx", "vs3", "ev3"),
        ]);
        let mut session = TokenSession::new(transport, false);

        session.get("https://portal/Login.aspx").unwrap();
        session
            .post("https://portal/Login.aspx", &[("field", "a")], false)
            .unwrap();
        session
            .post("https://portal/Home.aspx", &[("field", "b")], false)
            .unwrap();

        let requests = &session.transport.requests;
        assert_eq!(form_value(requests, 1, "__VIEWSTATE").as_deref(), Some("vs1"));
        assert_eq!(
            form_value(requests, 1, "__EVENTVALIDATION").as_deref(),
            Some("ev1")
        );
        // Second POST carries the pair reissued by the first POST's response.
        assert_eq!(form_value(requests, 2, "__VIEWSTATE").as_deref(), Some("vs2"));
        assert_eq!(
            form_value(requests, 2, "__EVENTVALIDATION").as_deref(),
            Some("ev2")
        );
    }

    #[test]
    fn caller_fields_are_rewritten_under_the_form_prefix() {
        let transport = ScriptedTransport::new(vec![
            page_with_tokens("https://portal/a", "vs", "ev"),
            page_with_tokens("https://portal/a", "vs", "ev"),
        ]);
        let mut session = TokenSession::new(transport, false);
        session.get("https://portal/a").unwrap();
        session
            .post("https://portal/a", &[("roleSelectList", "Proxy")], false)
            .unwrap();

        assert_eq!(
            form_value(&session.transport.requests, 1, "ctl00$pageContent$roleSelectList")
                .as_deref(),
            Some("Proxy")
        );
    }

    #[test]
    fn coordinate_suffix_expands_to_click_target() {
        let transport = ScriptedTransport::new(vec![
            page_with_tokens("https://portal/a", "vs", "ev"),
            page_with_tokens("https://portal/a", "vs", "ev"),
        ]);
        let mut session = TokenSession::new(transport, false);
        session.get("https://portal/a").unwrap();
        session
            .post("https://portal/a", &[("btnContinue.?", "0")], false)
            .unwrap();

        let requests = &session.transport.requests;
        assert_eq!(
            form_value(requests, 1, "ctl00$pageContent$btnContinue.x").as_deref(),
            Some("0")
        );
        assert_eq!(
            form_value(requests, 1, "ctl00$pageContent$btnContinue.y").as_deref(),
            Some("0")
        );
    }

    #[test]
    fn non_success_status_is_fatal() {
        let mut error_page = page_with_tokens("https://portal/a", "vs", "ev");
        error_page.status = 500;
        let transport = ScriptedTransport::new(vec![error_page]);
        let mut session = TokenSession::new(transport, false);

        let err = session.get("https://portal/a").unwrap_err();
        assert!(matches!(err, PortalError::Transport { status: 500, .. }));
    }

    #[test]
    fn missing_token_input_is_fatal() {
        let transport = ScriptedTransport::new(vec![RawResponse {
            final_url: "https://portal/a".into(),
            status: 200,
            content_disposition: None,
            body: "<html><body>no form here</body></html>".into(),
        }]);
        let mut session = TokenSession::new(transport, false);

        let err = session.get("https://portal/a").unwrap_err();
        assert!(matches!(err, PortalError::MissingToken { .. }));
    }

    #[test]
    fn verify_url_flags_desynchronization() {
        let session = TokenSession::new(ScriptedTransport::new(vec![]), false);
        assert!(session.verify_url("https://a", "https://a").is_ok());
        let err = session.verify_url("https://a", "https://b").unwrap_err();
        assert!(matches!(err, PortalError::Navigation { .. }));
    }
}
