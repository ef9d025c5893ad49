//! The host bootstrap pipeline: an ordered list of idempotent steps, each able
//! to say whether it is already applied so a failed run can be re-invoked
//! from the top.

pub mod commands;
pub mod context;
mod config_file;
mod packages;
mod preflight;
mod service;
mod smoke;
mod tunnel;
mod tunnel_client;
mod venv;

pub use commands::{
    Bounded, CommandRunner, Downloader, HostCommand, HttpDownloader, TokioCommandRunner,
};
pub use context::{HostIdentity, ProvisionContext, ProvisionOptions, TunnelState};

use async_trait::async_trait;
use chrono::Utc;
use slackbot_deploy_core::config::RunRecord;
use slackbot_deploy_core::AppError;

#[async_trait]
pub trait Step: Send + Sync {
    /// Human-readable name used in the `[Step i/N]` header.
    fn title(&self) -> &'static str;

    /// Whether the host already reflects this step. Checks may record what
    /// they find in the context for later steps.
    async fn is_applied(&self, _ctx: &mut ProvisionContext<'_>) -> Result<bool, AppError> {
        Ok(false)
    }

    async fn apply(&self, ctx: &mut ProvisionContext<'_>) -> Result<(), AppError>;
}

/// All steps, in execution order.
pub fn steps() -> Vec<Box<dyn Step>> {
    vec![
        Box::new(preflight::PreflightGuard),
        Box::new(packages::PackageInstaller),
        Box::new(tunnel_client::TunnelClientInstaller),
        Box::new(venv::EnvironmentBuilder),
        Box::new(config_file::ConfigMaterializer),
        Box::new(smoke::SmokeTester),
        Box::new(service::ServiceRegistrar::App),
        Box::new(tunnel::TunnelProvisioner),
        Box::new(service::ServiceRegistrar::Tunnel),
    ]
}

/// Run every step in order, skipping those already applied (unless
/// `force` is set). The first failing step aborts the run; nothing that
/// already happened is undone.
pub async fn run(ctx: &mut ProvisionContext<'_>) -> Result<RunRecord, AppError> {
    let steps = steps();
    let total = steps.len();

    for (i, step) in steps.iter().enumerate() {
        ctx.emit(&format!("\n[Step {}/{total}] {}...", i + 1, step.title()));
        if !ctx.options.force && step.is_applied(ctx).await? {
            ctx.emit("  Already applied, skipping");
            continue;
        }
        step.apply(ctx).await?;
    }

    let tunnel = ctx.tunnel.clone().ok_or(AppError::TunnelNotProvisioned)?;
    let record = RunRecord {
        id: RunRecord::new_id(),
        install_root: ctx.root().to_path_buf(),
        service_user: ctx.service_user().to_string(),
        cloudflared: ctx.options.cloudflared.clone(),
        tunnel_name: tunnel.name,
        tunnel_id: tunnel.id,
        hostname: tunnel.hostname,
        completed_at: Utc::now(),
    };
    let path = record.save()?;
    ctx.emit(&format!("\n  Run record saved: {}", path.display()));
    Ok(record)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub title: &'static str,
    pub applied: bool,
}

/// Evaluate every step's check without applying anything.
pub async fn plan(ctx: &mut ProvisionContext<'_>) -> Result<Vec<PlanEntry>, AppError> {
    let mut entries = Vec::new();
    for step in steps() {
        let applied = step.is_applied(ctx).await?;
        entries.push(PlanEntry {
            title: step.title(),
            applied,
        });
    }
    Ok(entries)
}
