use crate::commands::{Bounded, HostCommand};
use crate::context::ProvisionContext;
use crate::Step;
use async_trait::async_trait;
use slackbot_deploy_core::config::{APP_UNIT, ENTRY_POINT, REQUIRED_ENV_KEYS};
use slackbot_deploy_core::env_file::{missing_keys, read_env};
use slackbot_deploy_core::AppError;
use slackbot_deploy_ui as ui;

/// Starts the bot for a few seconds to catch crash-on-start. Never fails the
/// run: every problem is reported as a warning.
pub struct SmokeTester;

fn is_active() -> HostCommand {
    HostCommand::new("systemctl").args(["is-active", "--quiet", APP_UNIT])
}

fn last_lines(bytes: &[u8], n: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

#[async_trait]
impl Step for SmokeTester {
    fn title(&self) -> &'static str {
        "Smoke testing the bot"
    }

    /// A running service already holds the port, so a second copy would only
    /// fail to bind. Unless this run changed the bot, the running service is
    /// the better evidence.
    async fn is_applied(&self, ctx: &mut ProvisionContext<'_>) -> Result<bool, AppError> {
        if ctx.app_changed {
            return Ok(false);
        }
        Ok(ctx.probe(is_active()).await)
    }

    async fn apply(&self, ctx: &mut ProvisionContext<'_>) -> Result<(), AppError> {
        // frees the port; the app service step restarts it afterwards
        if ctx.probe(is_active()).await {
            ctx.emit(&format!("  Stopping {APP_UNIT} for the smoke test"));
            ctx.exec(HostCommand::sudo("systemctl").args(["stop", APP_UNIT]))
                .await?;
        }

        let vars = match read_env(&ctx.env_file()) {
            Ok(vars) => vars,
            Err(e) => {
                ctx.warn(&format!("could not read .env: {e}"));
                Vec::new()
            }
        };
        let missing = missing_keys(&vars, REQUIRED_ENV_KEYS);
        if !missing.is_empty() {
            ctx.warn(&format!(".env has no value for {}", missing.join(", ")));
        }

        let timeout = ctx.options.smoke_timeout;
        let cmd = HostCommand::new(ctx.venv_bin("python").display().to_string())
            .arg(ctx.root().join(ENTRY_POINT).display().to_string())
            .envs(vars)
            .current_dir(ctx.root());

        let sp = ui::spinner(&format!("Running {cmd} for {}s...", timeout.as_secs()));
        let outcome = ctx.runner.run_bounded(&cmd, timeout).await;
        sp.finish_and_clear();

        match outcome {
            Ok(Bounded::TimedOut { .. }) => {
                ctx.emit(&format!(
                    "  Bot still running after {}s, no startup crash",
                    timeout.as_secs()
                ));
            }
            Ok(Bounded::Exited(out)) if out.status.success() => {
                ctx.warn("bot exited on its own before the timeout (status 0)");
            }
            Ok(Bounded::Exited(out)) => {
                let code = out
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string());
                ctx.warn(&format!(
                    "bot exited early with status {code}:\n{}",
                    last_lines(&out.stderr, 20)
                ));
            }
            Err(e) => ctx.warn(&format!("smoke test could not run: {e}")),
        }
        Ok(())
    }
}
