mod commands;

use clap::{Parser, Subcommand};
use commands::install::InstallParams;
use slackbot_deploy_core::config::{CloudflaredRelease, DEFAULT_APP_PORT};
use slackbot_deploy_core::AppError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "slackbot-deploy",
    version,
    about = "Bootstrap a Slack bot host: venv, systemd service and Cloudflare Tunnel"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every bootstrap step: packages → cloudflared → venv → .env → smoke test → services → tunnel
    Install {
        /// Install root holding main.py and requirements.txt (default: current directory)
        #[arg(long, env = "SLACKBOT_ROOT")]
        root: Option<PathBuf>,

        /// User the bot service runs as (default: invoking user; the tunnel always runs as the invoking user)
        #[arg(long, env = "SLACKBOT_USER")]
        user: Option<String>,

        /// cloudflared release to install, or "latest"
        #[arg(long, env = "CLOUDFLARED_VERSION", default_value_t = CloudflaredRelease::default())]
        cloudflared_version: CloudflaredRelease,

        /// Local port the bot listens on
        #[arg(long, env = "SLACKBOT_PORT", default_value_t = DEFAULT_APP_PORT)]
        port: u16,

        /// Seconds the smoke test lets the bot run before stopping it
        #[arg(long, env = "SLACKBOT_SMOKE_TIMEOUT", default_value = "5")]
        smoke_timeout: u64,

        /// Tunnel name (skips the prompt)
        #[arg(long, env = "SLACKBOT_TUNNEL_NAME")]
        tunnel_name: Option<String>,

        /// Public hostname routed to the bot (skips the prompt)
        #[arg(long, env = "SLACKBOT_HOSTNAME")]
        hostname: Option<String>,

        /// Write the routing config even if the tunnel id cannot be determined
        #[arg(long, env = "SLACKBOT_ALLOW_MISSING_TUNNEL_ID", default_value = "false")]
        allow_missing_tunnel_id: bool,

        /// Re-apply steps that already look applied
        #[arg(long, env = "SLACKBOT_FORCE", default_value = "false")]
        force: bool,

        /// Never wait for the operator; prompts without a flag value or default fail
        #[arg(long, env = "SLACKBOT_NON_INTERACTIVE", default_value = "false")]
        non_interactive: bool,
    },

    /// Show which bootstrap steps are already applied on this host
    Plan {
        /// Install root (default: current directory)
        #[arg(long, env = "SLACKBOT_ROOT")]
        root: Option<PathBuf>,
    },

    /// Show service status for the bot and the tunnel
    Status {
        /// Install root (default: current directory)
        #[arg(long, env = "SLACKBOT_ROOT")]
        root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli).await {
        eprintln!("\nError: {e:#}");
        let code = e
            .downcast_ref::<AppError>()
            .map_or(1, AppError::exit_code);
        std::process::exit(code);
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Install {
            root,
            user,
            cloudflared_version,
            port,
            smoke_timeout,
            tunnel_name,
            hostname,
            allow_missing_tunnel_id,
            force,
            non_interactive,
        } => {
            let params = InstallParams {
                root,
                user,
                cloudflared: cloudflared_version,
                port,
                smoke_timeout,
                tunnel_name,
                hostname,
                allow_missing_tunnel_id,
                force,
                non_interactive,
            };
            commands::install::run(params).await?;
        }
        Commands::Plan { root } => {
            commands::plan::run(root).await?;
        }
        Commands::Status { root } => {
            commands::status::run(root).await?;
        }
    }
    Ok(())
}
