use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub portal: PortalConfig,
    pub directory: DirectoryConfig,
    pub output: OutputConfig,
}

/// egrades portal configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PortalConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// The portal intermittently serves a broken certificate chain.
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
}

/// Reference pages consumed by the email directories
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_faculty_url")]
    pub faculty_url: String,

    #[serde(default = "default_grad_url")]
    pub grad_url: String,

    #[serde(default = "default_email_domain")]
    pub email_domain: String,
}

/// Merged-dataset output
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_json_path")]
    pub json_path: PathBuf,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://egrades.sa.ucsb.edu/".to_string()
}
fn default_user_agent() -> String {
    "egrades-rosters/0.1 (course roster collection)".to_string()
}
fn default_faculty_url() -> String {
    "http://cs.ucsb.edu/courses/schedules/".to_string()
}
fn default_grad_url() -> String {
    "http://cs.ucsb.edu/~bboe/p/list_grads".to_string()
}
fn default_email_domain() -> String {
    "cs.ucsb.edu".to_string()
}
fn default_json_path() -> PathBuf {
    PathBuf::from("output.json")
}
fn default_true() -> bool {
    true
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("EGRADES").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());
        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            portal: PortalConfig {
                base_url: default_base_url(),
                user_agent: default_user_agent(),
                accept_invalid_certs: true,
            },
            directory: DirectoryConfig {
                faculty_url: default_faculty_url(),
                grad_url: default_grad_url(),
                email_domain: default_email_domain(),
            },
            output: OutputConfig {
                json_path: default_json_path(),
            },
        }
    }
}
