use super::resolve_root;
use anyhow::Result;
use console::style;
use slackbot_deploy_provision::{
    plan, HostIdentity, ProvisionContext, ProvisionOptions, TokioCommandRunner,
};
use slackbot_deploy_ui::ScriptedPrompter;
use std::path::PathBuf;

/// Print each step with whether the host already reflects it.
pub async fn run(root: Option<PathBuf>) -> Result<()> {
    let options = ProvisionOptions::new(resolve_root(root)?)?;
    let runner = TokioCommandRunner;
    // checks never prompt
    let prompter = ScriptedPrompter::default();
    let mut ctx = ProvisionContext::new(options, HostIdentity::detect(), &runner, &prompter);

    println!("Install root: {}\n", ctx.root().display());
    let entries = plan(&mut ctx).await?;
    for (i, entry) in entries.iter().enumerate() {
        let state = if entry.applied {
            style("applied").green().to_string()
        } else {
            style("pending").yellow().to_string()
        };
        println!("  [{}/{}] {:<42} {state}", i + 1, entries.len(), entry.title);
    }

    let pending = entries.iter().filter(|e| !e.applied).count();
    println!("\n  {pending} step(s) would run with `slackbot-deploy install`");
    Ok(())
}
