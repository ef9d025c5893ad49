use crate::commands::HostCommand;
use crate::context::ProvisionContext;
use crate::Step;
use async_trait::async_trait;
use slackbot_deploy_core::config::SYSTEM_PACKAGES;
use slackbot_deploy_core::AppError;
use slackbot_deploy_ui as ui;

/// Python runtime, pip, venv and curl from apt.
pub struct PackageInstaller;

const INSTALLED: &str = "install ok installed";

#[async_trait]
impl Step for PackageInstaller {
    fn title(&self) -> &'static str {
        "Installing system packages"
    }

    async fn is_applied(&self, ctx: &mut ProvisionContext<'_>) -> Result<bool, AppError> {
        let query = HostCommand::new("dpkg-query")
            .args(["-W", "-f=${Status}\\n"])
            .args(SYSTEM_PACKAGES.iter().copied());
        let Ok(out) = ctx.runner.run(&query).await else {
            return Ok(false);
        };
        if !out.status.success() {
            return Ok(false);
        }
        let stdout = String::from_utf8_lossy(&out.stdout);
        let statuses: Vec<&str> = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        Ok(statuses.len() == SYSTEM_PACKAGES.len() && statuses.iter().all(|s| *s == INSTALLED))
    }

    async fn apply(&self, ctx: &mut ProvisionContext<'_>) -> Result<(), AppError> {
        let sp = ui::spinner("Updating apt package index...");
        let update = ctx
            .exec(HostCommand::sudo("apt-get").arg("update"))
            .await;
        sp.finish_and_clear();
        update?;

        let sp = ui::spinner(&format!("Installing {}...", SYSTEM_PACKAGES.join(", ")));
        let install = ctx
            .exec(
                HostCommand::sudo("apt-get")
                    .args(["install", "-y"])
                    .args(SYSTEM_PACKAGES.iter().copied()),
            )
            .await;
        sp.finish_and_clear();
        install?;

        ctx.emit(&format!("  Installed: {}", SYSTEM_PACKAGES.join(" ")));
        Ok(())
    }
}
