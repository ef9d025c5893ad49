use super::resolve_root;
use anyhow::{bail, Result};
use slackbot_deploy_core::config::{CloudflaredRelease, RunRecord};
use slackbot_deploy_provision::{
    HostIdentity, ProvisionContext, ProvisionOptions, TokioCommandRunner,
};
use slackbot_deploy_ui::{self as ui, Prompter, ScriptedPrompter, TerminalPrompter};
use std::path::PathBuf;
use std::time::Duration;

/// Parameters for an install run.
pub struct InstallParams {
    pub root: Option<PathBuf>,
    pub user: Option<String>,
    pub cloudflared: CloudflaredRelease,
    pub port: u16,
    pub smoke_timeout: u64,
    pub tunnel_name: Option<String>,
    pub hostname: Option<String>,
    pub allow_missing_tunnel_id: bool,
    pub force: bool,
    /// If true, pauses continue immediately and unanswered prompts fail.
    pub non_interactive: bool,
}

/// Run the full bootstrap. Returns the run record on success.
pub async fn run(params: InstallParams) -> Result<RunRecord> {
    if params.smoke_timeout == 0 {
        bail!("--smoke-timeout must be at least 1 second");
    }
    let root = resolve_root(params.root)?;

    let mut options = ProvisionOptions::new(root)?;
    options.service_user = params.user;
    options.cloudflared = params.cloudflared;
    options.app_port = params.port;
    options.smoke_timeout = Duration::from_secs(params.smoke_timeout);
    options.tunnel_name = params.tunnel_name;
    options.hostname = params.hostname;
    options.allow_missing_tunnel_id = params.allow_missing_tunnel_id;
    options.force = params.force;

    let prompter: Box<dyn Prompter> = if params.non_interactive {
        Box::new(ScriptedPrompter::default())
    } else {
        Box::new(TerminalPrompter)
    };
    let runner = TokioCommandRunner;
    let mut ctx = ProvisionContext::new(options, HostIdentity::detect(), &runner, prompter.as_ref());

    let record = slackbot_deploy_provision::run(&mut ctx).await?;
    ui::print_summary(&record);
    Ok(record)
}
