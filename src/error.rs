use thiserror::Error;

/// Fatal conditions. Anything here aborts the run; recoverable situations
/// (login retry, unknown email, malformed TA entry) are handled as control
/// flow where they occur.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Non-success HTTP status from the portal or a reference page.
    #[error("HTTP {status} fetching {url}")]
    Transport { status: u16, url: String },

    /// The response landed somewhere other than the page the next step
    /// requires. The navigation state machine has desynchronized from the
    /// portal; continuing would corrupt downstream state.
    #[error("expected to land on {expected}, found {found}")]
    Navigation { expected: String, found: String },

    /// The download action did not announce a file.
    #[error("no content-disposition header; the portal did not produce a file")]
    Download,

    /// Two directory listing rows normalized to the same lookup key.
    #[error("ambiguous directory entry: {name:?} appears twice")]
    DirectoryAmbiguity { name: String },

    /// An anti-forgery token input was missing from a full page response.
    /// Continuing with stale tokens would silently break every later POST.
    #[error("page is missing hidden input {id:?}")]
    MissingToken { id: String },

    /// A required page element (dropdown selection, table cell) was absent.
    #[error("page is missing expected element: {0}")]
    MissingField(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid portal url: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = PortalError> = std::result::Result<T, E>;
