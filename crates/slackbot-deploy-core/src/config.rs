use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const APP_UNIT: &str = "slackbot";
pub const TUNNEL_UNIT: &str = "cloudflared";
pub const DEFAULT_TUNNEL_NAME: &str = "slackbot";
pub const DEFAULT_APP_PORT: u16 = 3000;
pub const RESTART_SEC: u32 = 10;
pub const DEFAULT_SMOKE_TIMEOUT: Duration = Duration::from_secs(5);
pub const SYSTEMD_DIR: &str = "/etc/systemd/system";
pub const CLOUDFLARED_BIN: &str = "/usr/bin/cloudflared";

/// cloudflared release installed unless `--cloudflared-version` says otherwise.
pub const PINNED_CLOUDFLARED_VERSION: &str = "2025.8.1";

pub const SYSTEM_PACKAGES: &[&str] = &["python3", "python3-pip", "python3-venv", "curl"];

pub const ENV_FILE: &str = ".env";
pub const ENV_TEMPLATE: &str = ".env.example";
pub const VENV_DIR: &str = "venv";
pub const REQUIREMENTS_FILE: &str = "requirements.txt";
pub const ENTRY_POINT: &str = "main.py";
pub const REQUIREMENTS_STAMP: &str = ".requirements.sha256";
pub const RUN_RECORD_FILE: &str = ".slackbot-deploy.json";

/// Keys the bot reads from its `.env`.
pub const REQUIRED_ENV_KEYS: &[&str] = &["SLACK_BOT_TOKEN", "SLACK_SIGNING_SECRET", "PORT"];

/// Written when the install root carries no `.env.example`.
pub const DEFAULT_ENV_TEMPLATE: &str = "\
# Slack bot credentials (https://api.slack.com/apps > your app)
SLACK_BOT_TOKEN=
SLACK_SIGNING_SECRET=
PORT=3000
";

/// ~/.cloudflared/
pub fn cloudflared_dir() -> Result<PathBuf, AppError> {
    let home = dirs::home_dir().ok_or(AppError::HomeDirNotFound)?;
    Ok(home.join(".cloudflared"))
}

/// Which cloudflared package to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloudflaredRelease {
    Pinned(String),
    Latest,
}

impl Default for CloudflaredRelease {
    fn default() -> Self {
        CloudflaredRelease::Pinned(PINNED_CLOUDFLARED_VERSION.to_string())
    }
}

impl FromStr for CloudflaredRelease {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(AppError::Other("empty cloudflared version".into())),
            "latest" => Ok(CloudflaredRelease::Latest),
            v => Ok(CloudflaredRelease::Pinned(v.trim_start_matches('v').to_string())),
        }
    }
}

impl fmt::Display for CloudflaredRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudflaredRelease::Pinned(v) => f.write_str(v),
            CloudflaredRelease::Latest => f.write_str("latest"),
        }
    }
}

impl CloudflaredRelease {
    /// Debian package URL on the GitHub releases page for `arch` (as in
    /// `std::env::consts::ARCH`).
    pub fn package_url(&self, arch: &str) -> Result<String, AppError> {
        let deb_arch = match arch {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "arm" => "arm",
            other => {
                return Err(AppError::Other(format!(
                    "no cloudflared package for architecture {other}"
                )))
            }
        };
        let base = "https://github.com/cloudflare/cloudflared/releases";
        Ok(match self {
            CloudflaredRelease::Pinned(v) => {
                format!("{base}/download/{v}/cloudflared-linux-{deb_arch}.deb")
            }
            CloudflaredRelease::Latest => {
                format!("{base}/latest/download/cloudflared-linux-{deb_arch}.deb")
            }
        })
    }

    /// Whether `cloudflared --version` output satisfies this release.
    pub fn is_satisfied_by(&self, version_output: &str) -> bool {
        match self {
            CloudflaredRelease::Pinned(v) => version_output
                .split_whitespace()
                .any(|word| word == v),
            CloudflaredRelease::Latest => version_output.contains("cloudflared"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub install_root: PathBuf,
    pub service_user: String,
    pub cloudflared: CloudflaredRelease,
    pub tunnel_name: String,
    pub tunnel_id: String,
    pub hostname: String,
    pub completed_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn path(install_root: &Path) -> PathBuf {
        install_root.join(RUN_RECORD_FILE)
    }

    pub fn save(&self) -> Result<PathBuf, AppError> {
        let path = Self::path(&self.install_root);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Load the record of the last successful run, if any.
    pub fn load(install_root: &Path) -> Result<Option<RunRecord>, AppError> {
        let path = Self::path(install_root);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    pub fn public_url(&self) -> String {
        format!("https://{}", self.hostname)
    }
}
