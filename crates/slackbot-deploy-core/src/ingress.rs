//! cloudflared routing config (`config.yml`) and tunnel id parsing.

use crate::error::AppError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const CONFIG_FILE: &str = "config.yml";
pub const ORIGIN_CERT: &str = "cert.pem";
pub const FALLBACK_SERVICE: &str = "http_status:404";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConfig {
    pub tunnel: String,
    #[serde(rename = "credentials-file")]
    pub credentials_file: PathBuf,
    pub ingress: Vec<IngressRule>,
}

impl TunnelConfig {
    /// One rule routing `hostname` to the local bot, then the 404 catch-all.
    pub fn new(
        tunnel_name: &str,
        tunnel_id: &str,
        tunnel_dir: &Path,
        hostname: &str,
        port: u16,
    ) -> Self {
        Self {
            tunnel: tunnel_name.to_string(),
            credentials_file: credentials_path(tunnel_dir, tunnel_id),
            ingress: vec![
                IngressRule {
                    hostname: Some(hostname.to_string()),
                    service: format!("http://localhost:{port}"),
                },
                IngressRule {
                    hostname: None,
                    service: FALLBACK_SERVICE.to_string(),
                },
            ],
        }
    }

    pub fn render(&self) -> Result<String, AppError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn parse(yaml: &str) -> Result<Self, AppError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::parse(&yaml)
    }

    /// Overwrites any existing config at `path`.
    pub fn write(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render()?)?;
        Ok(())
    }

    /// Hostname of the first routed rule.
    pub fn hostname(&self) -> Option<&str> {
        self.ingress.iter().find_map(|r| r.hostname.as_deref())
    }

    /// Tunnel id as encoded in the credentials file name.
    pub fn tunnel_id(&self) -> String {
        self.credentials_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// `<tunnel_dir>/<id>.json`
pub fn credentials_path(tunnel_dir: &Path, tunnel_id: &str) -> PathBuf {
    tunnel_dir.join(format!("{tunnel_id}.json"))
}

/// Accept a bare DNS name (no scheme, port, path or spaces), lowercased.
pub fn validate_hostname(input: &str) -> Result<String, AppError> {
    static HOST: OnceLock<Regex> = OnceLock::new();
    let re = HOST.get_or_init(|| {
        Regex::new(r"^(?i)[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)+$")
            .unwrap_or_else(|e| unreachable!("static regex: {e}"))
    });
    let host = input.trim();
    if host.is_empty() {
        return Err(AppError::MissingHostname);
    }
    if host.len() > 253 || !re.is_match(host) {
        return Err(AppError::InvalidHostname(host.to_string()));
    }
    Ok(host.to_lowercase())
}

/// Tunnel names end up unquoted in the unit's `ExecStart`, so only a
/// conservative character set is allowed.
pub fn validate_tunnel_name(name: &str) -> Result<&str, AppError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if ok {
        Ok(name)
    } else {
        Err(AppError::InvalidTunnelName(name.to_string()))
    }
}

/// Pull the tunnel UUID out of `cloudflared tunnel create` output, e.g.
/// `Created tunnel slackbot with id 6ff42ae2-765d-4adf-8112-31c55c1551ef`.
pub fn parse_tunnel_id(output: &str) -> Option<String> {
    static UUID: OnceLock<Regex> = OnceLock::new();
    let re = UUID.get_or_init(|| {
        Regex::new(r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b")
            .unwrap_or_else(|e| unreachable!("static regex: {e}"))
    });
    re.find(output).map(|m| m.as_str().to_lowercase())
}
