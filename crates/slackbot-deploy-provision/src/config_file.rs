use crate::context::ProvisionContext;
use crate::Step;
use async_trait::async_trait;
use slackbot_deploy_core::config::DEFAULT_ENV_TEMPLATE;
use slackbot_deploy_core::AppError;

/// Creates `.env` from `.env.example` once and hands control to the operator
/// to fill it in. An existing `.env` is never touched.
pub struct ConfigMaterializer;

#[async_trait]
impl Step for ConfigMaterializer {
    fn title(&self) -> &'static str {
        "Preparing .env configuration"
    }

    async fn is_applied(&self, ctx: &mut ProvisionContext<'_>) -> Result<bool, AppError> {
        Ok(ctx.env_file().exists())
    }

    async fn apply(&self, ctx: &mut ProvisionContext<'_>) -> Result<(), AppError> {
        let env_file = ctx.env_file();
        if env_file.exists() {
            ctx.emit(&format!("  {} already exists, leaving it alone", env_file.display()));
            return Ok(());
        }

        let template = ctx.env_template();
        if template.exists() {
            std::fs::copy(&template, &env_file)?;
            ctx.emit(&format!(
                "  Copied {} -> {}",
                template.display(),
                env_file.display()
            ));
        } else {
            std::fs::write(&env_file, DEFAULT_ENV_TEMPLATE)?;
            ctx.emit(&format!(
                "  No {} found, wrote a blank {}",
                template.display(),
                env_file.display()
            ));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&env_file, std::fs::Permissions::from_mode(0o600))?;
        }
        ctx.app_changed = true;

        ctx.prompter.pause(&format!(
            "Edit {} and set SLACK_BOT_TOKEN and SLACK_SIGNING_SECRET",
            env_file.display()
        ))?;
        Ok(())
    }
}
