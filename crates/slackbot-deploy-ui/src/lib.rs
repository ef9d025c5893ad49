pub mod progress;
pub mod prompt;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use slackbot_deploy_core::config::{RunRecord, APP_UNIT, TUNNEL_UNIT};
use std::time::Duration;

pub use prompt::{Prompter, ScriptedPrompter, TerminalPrompter};

/// Create a spinner with a message.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print the install summary.
pub fn print_summary(record: &RunRecord) {
    let divider = "=".repeat(60);

    println!("\n{divider}");
    println!("  {}", style("Slack Bot Deployment Complete").green().bold());
    println!("{divider}");
    println!("  Install Root:      {}", record.install_root.display());
    println!("  Service User:      {}", record.service_user);
    println!("  Public URL:        {}", record.public_url());
    println!("  Tunnel:            {} ({})", record.tunnel_name, display_id(&record.tunnel_id));
    println!("  cloudflared:       {}", record.cloudflared);
    println!();
    println!("  Slack app settings:");
    println!("    Request URL:     {}/slack/events", record.public_url());
    println!();
    println!("{divider}");
    println!("  Next steps:");
    println!("    1. sudo systemctl status {APP_UNIT} {TUNNEL_UNIT}");
    println!("    2. journalctl -u {APP_UNIT} -f");
    println!("    3. curl -I {}", record.public_url());
    println!("{divider}\n");
}

fn display_id(id: &str) -> &str {
    if id.is_empty() {
        "id missing, check config.yml"
    } else {
        id
    }
}
