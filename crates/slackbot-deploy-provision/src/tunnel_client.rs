use crate::commands::{combined_output, HostCommand};
use crate::context::ProvisionContext;
use crate::Step;
use async_trait::async_trait;
use slackbot_deploy_core::AppError;
use slackbot_deploy_ui as ui;

/// Installs the cloudflared Debian package for the requested release.
pub struct TunnelClientInstaller;

fn version_cmd() -> HostCommand {
    HostCommand::new("cloudflared").arg("--version")
}

#[async_trait]
impl Step for TunnelClientInstaller {
    fn title(&self) -> &'static str {
        "Installing cloudflared"
    }

    async fn is_applied(&self, ctx: &mut ProvisionContext<'_>) -> Result<bool, AppError> {
        match ctx.runner.run(&version_cmd()).await {
            Ok(out) if out.status.success() => Ok(ctx
                .options
                .cloudflared
                .is_satisfied_by(&combined_output(&out))),
            _ => Ok(false),
        }
    }

    async fn apply(&self, ctx: &mut ProvisionContext<'_>) -> Result<(), AppError> {
        let release = ctx.options.cloudflared.clone();
        let url = release.package_url(std::env::consts::ARCH)?;
        let deb = std::env::temp_dir().join(format!("cloudflared-{}.deb", uuid::Uuid::new_v4()));

        ctx.emit(&format!("  Release: {release}"));
        let sp = ui::spinner(&format!("Downloading {url}..."));
        let fetched = ctx.downloader.download(&url, &deb).await;
        sp.finish_and_clear();
        if let Err(e) = fetched {
            let _ = tokio::fs::remove_file(&deb).await;
            return Err(e);
        }

        let installed = ctx
            .exec(HostCommand::sudo("dpkg").arg("-i").arg(deb.display().to_string()))
            .await;
        let _ = tokio::fs::remove_file(&deb).await;
        installed?;

        let version = ctx.exec(version_cmd()).await?;
        ctx.emit(&format!(
            "  {}",
            String::from_utf8_lossy(&version.stdout).trim()
        ));
        Ok(())
    }
}
