use crate::context::ProvisionContext;
use crate::Step;
use async_trait::async_trait;
use slackbot_deploy_core::AppError;

/// Refuses to run as root. Later steps elevate per command.
pub struct PreflightGuard;

#[async_trait]
impl Step for PreflightGuard {
    fn title(&self) -> &'static str {
        "Checking invoking user and install root"
    }

    async fn apply(&self, ctx: &mut ProvisionContext<'_>) -> Result<(), AppError> {
        if ctx.identity.is_superuser() {
            return Err(AppError::Superuser);
        }
        let root = ctx.root();
        if !root.is_absolute() {
            return Err(AppError::Other(format!(
                "install root must be an absolute path, got {}",
                root.display()
            )));
        }
        if !root.is_dir() {
            return Err(AppError::MissingFile(root.to_path_buf()));
        }
        ctx.emit(&format!(
            "  User:         {} (uid {})",
            ctx.identity.user, ctx.identity.uid
        ));
        ctx.emit(&format!("  Install root: {}", root.display()));
        ctx.emit(&format!("  Service user: {}", ctx.service_user()));
        Ok(())
    }
}
