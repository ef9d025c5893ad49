use crate::commands::{check_status, combined_output, HostCommand};
use crate::context::{ProvisionContext, TunnelState};
use crate::Step;
use async_trait::async_trait;
use serde::Deserialize;
use slackbot_deploy_core::config::DEFAULT_TUNNEL_NAME;
use slackbot_deploy_core::ingress::{
    credentials_path, parse_tunnel_id, validate_hostname, validate_tunnel_name, TunnelConfig,
};
use slackbot_deploy_core::AppError;

/// Logs cloudflared in, creates (or reuses) a named tunnel and writes the
/// routing config that sends the public hostname to the local bot.
pub struct TunnelProvisioner;

#[derive(Deserialize)]
struct TunnelListing {
    id: String,
    name: String,
}

fn cloudflared(args: &[&str]) -> HostCommand {
    HostCommand::new("cloudflared").args(args.iter().copied())
}

/// An empty or blank answer falls back to the default name.
fn tunnel_name(answer: &str) -> Result<String, AppError> {
    match answer.trim() {
        "" => Ok(DEFAULT_TUNNEL_NAME.to_string()),
        name => validate_tunnel_name(name).map(str::to_string),
    }
}

impl TunnelProvisioner {
    async fn login(&self, ctx: &ProvisionContext<'_>) -> Result<(), AppError> {
        let cert = ctx.origin_cert_path();
        if cert.exists() {
            ctx.emit(&format!("  Already logged in ({})", cert.display()));
            return Ok(());
        }
        ctx.prompter.pause(
            "cloudflared will now open a browser (or print a URL) to authorize this host with your Cloudflare account",
        )?;
        let login = cloudflared(&["tunnel", "login"]);
        let status = ctx.runner.run_interactive(&login).await?;
        check_status(&login, status)
    }

    /// Id of an existing tunnel called `name` whose credentials are on this
    /// host, so a re-run does not trip over "tunnel already exists".
    async fn existing_tunnel(&self, ctx: &ProvisionContext<'_>, name: &str) -> Option<String> {
        let out = ctx
            .runner
            .run(&cloudflared(&["tunnel", "list", "--output", "json", "--name", name]))
            .await
            .ok()
            .filter(|o| o.status.success())?;
        let listings: Vec<TunnelListing> = serde_json::from_slice(&out.stdout).ok()?;
        listings
            .into_iter()
            .find(|t| t.name == name && credentials_path(&ctx.options.tunnel_dir, &t.id).exists())
            .map(|t| t.id)
    }

    async fn create(&self, ctx: &ProvisionContext<'_>, name: &str) -> Result<String, AppError> {
        if let Some(id) = self.existing_tunnel(ctx, name).await {
            ctx.emit(&format!("  Reusing existing tunnel {name} ({id})"));
            return Ok(id);
        }

        let out = ctx.exec(cloudflared(&["tunnel", "create", name])).await?;
        let text = combined_output(&out);
        match parse_tunnel_id(&text) {
            Some(id) => {
                ctx.emit(&format!("  Created tunnel {name} ({id})"));
                Ok(id)
            }
            None if ctx.options.allow_missing_tunnel_id => {
                ctx.warn("could not find the tunnel id in `cloudflared tunnel create` output");
                ctx.warn(&format!(
                    "{} will reference an empty credentials file; fix it by hand",
                    ctx.tunnel_config_path().display()
                ));
                ctx.prompter.pause(
                    "Look up the id with `cloudflared tunnel list` before continuing",
                )?;
                Ok(String::new())
            }
            None => Err(AppError::TunnelIdMissing {
                output: text.trim().to_string(),
            }),
        }
    }

    async fn route_dns(&self, ctx: &ProvisionContext<'_>, name: &str, hostname: &str) {
        let route = cloudflared(&["tunnel", "route", "dns", name, hostname]);
        match ctx.runner.run(&route).await {
            Ok(out) if out.status.success() => {
                ctx.emit(&format!("  DNS record for {hostname} points at tunnel {name}"));
            }
            Ok(out) => {
                ctx.warn(&format!(
                    "DNS route failed: {}",
                    String::from_utf8_lossy(&out.stderr).trim()
                ));
                ctx.warn(&format!("run `{route}` yourself once the zone is ready"));
            }
            Err(e) => ctx.warn(&format!("DNS route failed: {e}")),
        }
    }
}

#[async_trait]
impl Step for TunnelProvisioner {
    fn title(&self) -> &'static str {
        "Provisioning Cloudflare Tunnel"
    }

    async fn is_applied(&self, ctx: &mut ProvisionContext<'_>) -> Result<bool, AppError> {
        let path = ctx.tunnel_config_path();
        if !path.exists() {
            return Ok(false);
        }
        let cfg = match TunnelConfig::load(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                ctx.warn(&format!("ignoring unreadable {}: {e}", path.display()));
                return Ok(false);
            }
        };
        let Some(hostname) = cfg.hostname().map(str::to_string) else {
            return Ok(false);
        };
        let wanted_service = format!("http://localhost:{}", ctx.options.app_port);
        let routes_to_bot = cfg.ingress.iter().any(|r| r.service == wanted_service);
        let name_matches = ctx
            .options
            .tunnel_name
            .as_deref()
            .map_or(true, |n| tunnel_name(n).is_ok_and(|n| n == cfg.tunnel));
        let host_matches = ctx
            .options
            .hostname
            .as_deref()
            .map_or(true, |h| validate_hostname(h).is_ok_and(|h| h == hostname));
        if !cfg.credentials_file.exists() || !routes_to_bot || !name_matches || !host_matches {
            return Ok(false);
        }

        ctx.tunnel = Some(TunnelState {
            id: cfg.tunnel_id(),
            name: cfg.tunnel,
            hostname,
        });
        Ok(true)
    }

    async fn apply(&self, ctx: &mut ProvisionContext<'_>) -> Result<(), AppError> {
        self.login(ctx).await?;

        let answer = match ctx.options.tunnel_name.clone() {
            Some(name) => name,
            None => ctx.prompter.input("Tunnel name", Some(DEFAULT_TUNNEL_NAME))?,
        };
        let name = tunnel_name(&answer)?;

        let id = self.create(ctx, &name).await?;

        let answer = match ctx.options.hostname.clone() {
            Some(host) => host,
            None => ctx
                .prompter
                .input("Public hostname (e.g. bot.example.com)", None)?,
        };
        let hostname = validate_hostname(&answer)?;

        let path = ctx.tunnel_config_path();
        TunnelConfig::new(
            &name,
            &id,
            &ctx.options.tunnel_dir,
            &hostname,
            ctx.options.app_port,
        )
        .write(&path)?;
        ctx.emit(&format!(
            "  Wrote {} ({hostname} -> http://localhost:{})",
            path.display(),
            ctx.options.app_port
        ));

        self.route_dns(ctx, &name, &hostname).await;

        ctx.tunnel = Some(TunnelState { name, id, hostname });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_tunnel_name_falls_back_to_default() {
        assert_eq!(tunnel_name("").unwrap(), "slackbot");
        assert_eq!(tunnel_name("   ").unwrap(), "slackbot");
        assert_eq!(tunnel_name(" prod-bot ").unwrap(), "prod-bot");
    }

    #[test]
    fn tunnel_name_with_inner_space_is_rejected() {
        assert!(matches!(
            tunnel_name("my bot"),
            Err(AppError::InvalidTunnelName(n)) if n == "my bot"
        ));
    }
}
