use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Refusing to run as root: run as the service user, privileged commands use sudo")]
    Superuser,

    #[error("No public hostname given, cannot configure tunnel routing")]
    MissingHostname,

    #[error("Invalid public hostname `{0}`: expected a bare DNS name such as bot.example.com")]
    InvalidHostname(String),

    #[error("Invalid tunnel name `{0}`: use letters, digits, '.', '_' or '-'")]
    InvalidTunnelName(String),

    #[error("Could not find a tunnel id in `cloudflared tunnel create` output:\n{output}")]
    TunnelIdMissing { output: String },

    #[error("Tunnel has not been provisioned yet (no name recorded)")]
    TunnelNotProvisioned,

    #[error("Required file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("`{command}` failed ({}): {stderr}", code.map_or_else(|| "killed by signal".to_string(), |c| format!("exit {c}")))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Download of {url} failed: {message}")]
    Download { url: String, message: String },

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Env file error: {0}")]
    Dotenv(#[from] dotenvy::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Process exit code for this error. Failed host commands propagate
    /// their own status; everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::CommandFailed { code: Some(c), .. } if *c != 0 => *c,
            _ => 1,
        }
    }
}
