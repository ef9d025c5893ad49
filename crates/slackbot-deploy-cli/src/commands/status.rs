use super::resolve_root;
use anyhow::Result;
use console::style;
use slackbot_deploy_core::config::{RunRecord, APP_UNIT, TUNNEL_UNIT};
use slackbot_deploy_provision::{CommandRunner, HostCommand, TokioCommandRunner};
use std::path::PathBuf;

/// Show the last run record and `systemctl status` for both units.
pub async fn run(root: Option<PathBuf>) -> Result<()> {
    let root = resolve_root(root)?;

    match RunRecord::load(&root)? {
        Some(record) => {
            println!("Last install:  {}", record.completed_at.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("Public URL:    {}", record.public_url());
            println!("Tunnel:        {} ({})", record.tunnel_name, record.tunnel_id);
            println!("Service user:  {}", record.service_user);
        }
        None => println!(
            "{}",
            style(format!("No install recorded in {}", root.display())).yellow()
        ),
    }

    let runner = TokioCommandRunner;
    for unit in [APP_UNIT, TUNNEL_UNIT] {
        let cmd = HostCommand::new("systemctl").args(["status", unit, "--no-pager"]);
        let out = runner.run(&cmd).await?;
        let label = if out.status.success() {
            style("active").green().to_string()
        } else {
            style("not active").red().to_string()
        };
        println!("\n{unit}: {label}");
        for line in String::from_utf8_lossy(&out.stdout).lines() {
            println!("  {line}");
        }
    }
    Ok(())
}
