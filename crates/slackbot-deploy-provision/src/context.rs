use crate::commands::{check, CommandRunner, Downloader, HostCommand, HttpDownloader};
use slackbot_deploy_core::config::{
    self, CloudflaredRelease, DEFAULT_APP_PORT, DEFAULT_SMOKE_TIMEOUT, ENV_FILE, ENV_TEMPLATE,
    REQUIREMENTS_FILE, SYSTEMD_DIR, VENV_DIR,
};
use slackbot_deploy_core::ingress::{CONFIG_FILE, ORIGIN_CERT};
use slackbot_deploy_core::AppError;
use slackbot_deploy_ui::Prompter;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::sync::mpsc;

/// Who is running the bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub user: String,
    pub uid: u32,
}

impl HostIdentity {
    pub fn is_superuser(&self) -> bool {
        self.uid == 0
    }

    /// Effective uid of this process and the login name from the environment.
    pub fn detect() -> Self {
        #[cfg(unix)]
        // SAFETY: geteuid has no preconditions and cannot fail.
        let uid = unsafe { libc::geteuid() };
        #[cfg(not(unix))]
        let uid = u32::MAX;

        let user = ["USER", "LOGNAME"]
            .iter()
            .find_map(|k| std::env::var(k).ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| if uid == 0 { "root".into() } else { "nobody".into() });
        Self { user, uid }
    }
}

/// Everything the operator can set for a run.
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    pub install_root: PathBuf,
    /// Run-as user for both units. Defaults to the invoking user.
    pub service_user: Option<String>,
    pub cloudflared: CloudflaredRelease,
    pub app_port: u16,
    pub smoke_timeout: Duration,
    pub tunnel_name: Option<String>,
    pub hostname: Option<String>,
    pub allow_missing_tunnel_id: bool,
    /// Apply every step even when its check says it is already done.
    pub force: bool,
    pub systemd_dir: PathBuf,
    /// Directory holding cloudflared's cert, credentials and `config.yml`.
    pub tunnel_dir: PathBuf,
}

impl ProvisionOptions {
    pub fn new(install_root: PathBuf) -> Result<Self, AppError> {
        Ok(Self {
            install_root,
            service_user: None,
            cloudflared: CloudflaredRelease::default(),
            app_port: DEFAULT_APP_PORT,
            smoke_timeout: DEFAULT_SMOKE_TIMEOUT,
            tunnel_name: None,
            hostname: None,
            allow_missing_tunnel_id: false,
            force: false,
            systemd_dir: PathBuf::from(SYSTEMD_DIR),
            tunnel_dir: config::cloudflared_dir()?,
        })
    }
}

/// Tunnel facts gathered by the provisioner or loaded from an existing config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunnelState {
    pub name: String,
    pub id: String,
    pub hostname: String,
}

/// Execution context threaded through every step.
pub struct ProvisionContext<'a> {
    pub options: ProvisionOptions,
    pub identity: HostIdentity,
    pub runner: &'a dyn CommandRunner,
    pub prompter: &'a dyn Prompter,
    pub downloader: &'a dyn Downloader,
    /// Optional tap on operator output, see `slackbot_deploy_ui::progress`.
    pub progress_tx: Option<mpsc::UnboundedSender<String>>,
    pub tunnel: Option<TunnelState>,
    /// Set when this run changed what the bot loads (dependencies or `.env`).
    /// A running bot is then stale, so the smoke test and the app service
    /// are not skipped.
    pub app_changed: bool,
}

impl<'a> ProvisionContext<'a> {
    pub fn new(
        options: ProvisionOptions,
        identity: HostIdentity,
        runner: &'a dyn CommandRunner,
        prompter: &'a dyn Prompter,
    ) -> Self {
        Self {
            options,
            identity,
            runner,
            prompter,
            downloader: &HttpDownloader,
            progress_tx: None,
            tunnel: None,
            app_changed: false,
        }
    }

    pub fn with_downloader(mut self, downloader: &'a dyn Downloader) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<String>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn root(&self) -> &Path {
        &self.options.install_root
    }

    pub fn service_user(&self) -> &str {
        self.options
            .service_user
            .as_deref()
            .unwrap_or(&self.identity.user)
    }

    pub fn venv_dir(&self) -> PathBuf {
        self.root().join(VENV_DIR)
    }

    pub fn venv_bin(&self, tool: &str) -> PathBuf {
        self.venv_dir().join("bin").join(tool)
    }

    pub fn env_file(&self) -> PathBuf {
        self.root().join(ENV_FILE)
    }

    pub fn env_template(&self) -> PathBuf {
        self.root().join(ENV_TEMPLATE)
    }

    pub fn requirements(&self) -> PathBuf {
        self.root().join(REQUIREMENTS_FILE)
    }

    pub fn tunnel_config_path(&self) -> PathBuf {
        self.options.tunnel_dir.join(CONFIG_FILE)
    }

    pub fn origin_cert_path(&self) -> PathBuf {
        self.options.tunnel_dir.join(ORIGIN_CERT)
    }

    pub fn emit(&self, msg: &str) {
        slackbot_deploy_ui::progress::emit(&self.progress_tx, msg);
    }

    pub fn warn(&self, msg: &str) {
        slackbot_deploy_ui::progress::warn(&self.progress_tx, msg);
    }

    /// Run `cmd` and fail on a non-zero exit.
    pub async fn exec(&self, cmd: HostCommand) -> Result<Output, AppError> {
        let output = self.runner.run(&cmd).await?;
        check(&cmd, output)
    }

    /// Run `cmd` and report only whether it exited zero. Spawn errors count
    /// as "no".
    pub async fn probe(&self, cmd: HostCommand) -> bool {
        matches!(self.runner.run(&cmd).await, Ok(out) if out.status.success())
    }
}
