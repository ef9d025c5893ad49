use crate::commands::HostCommand;
use crate::context::ProvisionContext;
use crate::Step;
use async_trait::async_trait;
use slackbot_deploy_core::config::REQUIREMENTS_STAMP;
use slackbot_deploy_core::digest::sha256_file;
use slackbot_deploy_core::AppError;
use slackbot_deploy_ui as ui;

/// Builds `<root>/venv` and installs `requirements.txt` into it. The digest of
/// the installed requirements is stamped into the venv so unchanged
/// requirements are not reinstalled.
pub struct EnvironmentBuilder;

#[async_trait]
impl Step for EnvironmentBuilder {
    fn title(&self) -> &'static str {
        "Building Python virtual environment"
    }

    async fn is_applied(&self, ctx: &mut ProvisionContext<'_>) -> Result<bool, AppError> {
        if !ctx.venv_bin("python").exists() {
            return Ok(false);
        }
        let Ok(current) = sha256_file(&ctx.requirements()) else {
            return Ok(false);
        };
        let stamp = std::fs::read_to_string(ctx.venv_dir().join(REQUIREMENTS_STAMP))
            .unwrap_or_default();
        Ok(stamp.trim() == current)
    }

    async fn apply(&self, ctx: &mut ProvisionContext<'_>) -> Result<(), AppError> {
        let requirements = ctx.requirements();
        let digest = sha256_file(&requirements)?;
        let venv = ctx.venv_dir();
        let pip = ctx.venv_bin("pip").display().to_string();

        ctx.exec(
            HostCommand::new("python3")
                .args(["-m", "venv"])
                .arg(venv.display().to_string()),
        )
        .await?;
        ctx.emit(&format!("  Created {}", venv.display()));

        ctx.exec(HostCommand::new(pip.clone()).args(["install", "--upgrade", "pip"]))
            .await?;

        let sp = ui::spinner(&format!("Installing {}...", requirements.display()));
        let installed = ctx
            .exec(
                HostCommand::new(pip)
                    .args(["install", "-r"])
                    .arg(requirements.display().to_string())
                    .current_dir(ctx.root()),
            )
            .await;
        sp.finish_and_clear();
        installed?;

        std::fs::create_dir_all(&venv)?;
        std::fs::write(venv.join(REQUIREMENTS_STAMP), format!("{digest}\n"))?;
        ctx.app_changed = true;
        ctx.emit("  Dependencies installed");
        Ok(())
    }
}
