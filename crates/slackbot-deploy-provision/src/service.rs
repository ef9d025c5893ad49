use crate::commands::{check, combined_output, HostCommand};
use crate::context::ProvisionContext;
use crate::Step;
use async_trait::async_trait;
use slackbot_deploy_core::config::{APP_UNIT, TUNNEL_UNIT};
use slackbot_deploy_core::unit::UnitSpec;
use slackbot_deploy_core::AppError;

/// Installs a systemd unit and starts it. Used for the bot and for the tunnel.
pub enum ServiceRegistrar {
    App,
    Tunnel,
}

impl ServiceRegistrar {
    fn unit(&self, ctx: &ProvisionContext<'_>) -> Result<UnitSpec, AppError> {
        match self {
            ServiceRegistrar::App => Ok(UnitSpec::app(APP_UNIT, ctx.root(), ctx.service_user())),
            // cloudflared reads its 0400 credentials from the invoking
            // user's tunnel dir, so it must run as that user
            ServiceRegistrar::Tunnel => {
                let tunnel = ctx.tunnel.as_ref().ok_or(AppError::TunnelNotProvisioned)?;
                Ok(UnitSpec::tunnel(
                    TUNNEL_UNIT,
                    ctx.root(),
                    &ctx.identity.user,
                    &ctx.tunnel_config_path(),
                    &tunnel.name,
                ))
            }
        }
    }
}

fn systemctl(args: &[&str]) -> HostCommand {
    HostCommand::new("systemctl").args(args.iter().copied())
}

fn sudo_systemctl(args: &[&str]) -> HostCommand {
    HostCommand::sudo("systemctl").args(args.iter().copied())
}

#[async_trait]
impl Step for ServiceRegistrar {
    fn title(&self) -> &'static str {
        match self {
            ServiceRegistrar::App => "Registering slackbot service",
            ServiceRegistrar::Tunnel => "Registering cloudflared service",
        }
    }

    async fn is_applied(&self, ctx: &mut ProvisionContext<'_>) -> Result<bool, AppError> {
        // new dependencies or .env only take effect on restart
        if matches!(self, ServiceRegistrar::App) && ctx.app_changed {
            return Ok(false);
        }
        let Ok(unit) = self.unit(ctx) else {
            return Ok(false);
        };
        let installed = std::fs::read_to_string(unit.path_in(&ctx.options.systemd_dir)).ok();
        if installed.as_deref() != Some(unit.render().as_str()) {
            return Ok(false);
        }
        Ok(ctx.probe(systemctl(&["is-enabled", "--quiet", &unit.name])).await
            && ctx.probe(systemctl(&["is-active", "--quiet", &unit.name])).await)
    }

    async fn apply(&self, ctx: &mut ProvisionContext<'_>) -> Result<(), AppError> {
        let unit = self.unit(ctx)?;
        let path = unit.path_in(&ctx.options.systemd_dir);

        let tee = HostCommand::sudo("tee").arg(path.display().to_string());
        let written = ctx.runner.run_with_stdin(&tee, unit.render().as_bytes()).await?;
        check(&tee, written)?;
        ctx.emit(&format!("  Wrote {}", path.display()));

        ctx.exec(sudo_systemctl(&["daemon-reload"])).await?;
        ctx.exec(sudo_systemctl(&["enable", &unit.name])).await?;
        // restart also starts a stopped unit and picks up a changed one
        ctx.exec(sudo_systemctl(&["restart", &unit.name])).await?;
        ctx.emit(&format!("  {} enabled and started", unit.file_name()));

        match ctx
            .runner
            .run(&systemctl(&["status", &unit.name, "--no-pager"]))
            .await
        {
            Ok(out) => {
                for line in combined_output(&out).lines() {
                    ctx.emit(&format!("    {line}"));
                }
                if !out.status.success() {
                    ctx.warn(&format!(
                        "{} is not reporting active yet, check `journalctl -u {}`",
                        unit.name, unit.name
                    ));
                }
            }
            Err(e) => ctx.warn(&format!("could not query {} status: {e}", unit.name)),
        }
        Ok(())
    }
}
