//! Shared test helpers: a fake host that records commands and replies from a
//! rule table, plus a throwaway install root.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use slackbot_deploy_core::config::PINNED_CLOUDFLARED_VERSION;
use slackbot_deploy_core::AppError;
use slackbot_deploy_provision::{
    Bounded, CommandRunner, Downloader, HostCommand, HostIdentity, ProvisionOptions,
};
use tempfile::TempDir;

pub const TUNNEL_ID: &str = "6ff42ae2-765d-4adf-8112-31c55c1551ef";

#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

fn output(code: i32, stdout: &str, stderr: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

#[derive(Debug, Clone)]
pub enum Reply {
    Ok(String),
    Fail(i32, String),
    TimedOut,
}

impl Reply {
    pub fn ok(stdout: &str) -> Self {
        Reply::Ok(stdout.to_string())
    }

    pub fn fail(code: i32, stderr: &str) -> Self {
        Reply::Fail(code, stderr.to_string())
    }

    fn to_output(&self) -> Output {
        match self {
            Reply::Ok(stdout) => output(0, stdout, ""),
            Reply::Fail(code, stderr) => output(*code, "", stderr),
            Reply::TimedOut => output(0, "", ""),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub command: String,
    pub stdin: Option<String>,
}

/// Records every command. Replies come from the first rule whose pattern is
/// contained in the command line; unmatched commands succeed silently and
/// bounded runs time out (a healthy long-running bot). Downloads are recorded
/// as `download <url>` and write a small placeholder package.
pub struct FakeHost {
    rules: Vec<(String, Reply)>,
    calls: Mutex<Vec<Call>>,
}

impl FakeHost {
    /// A host where cloudflared is installed at the pinned version, no unit is
    /// active yet, and `tunnel create` prints a fresh id.
    pub fn new() -> Self {
        Self {
            rules: vec![
                (
                    "cloudflared --version".into(),
                    Reply::ok(&format!(
                        "cloudflared version {PINNED_CLOUDFLARED_VERSION} (built 2025-08-20-1200 UTC)"
                    )),
                ),
                ("systemctl is-active".into(), Reply::fail(3, "")),
                ("systemctl is-enabled".into(), Reply::fail(1, "")),
                (
                    "cloudflared tunnel create".into(),
                    Reply::ok(&format!("Created tunnel slackbot with id {TUNNEL_ID}\n")),
                ),
            ],
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Add a rule that takes precedence over everything registered before it.
    pub fn on(mut self, pattern: &str, reply: Reply) -> Self {
        self.rules.insert(0, (pattern.to_string(), reply));
        self
    }

    fn reply_for(&self, cmd: &HostCommand, stdin: Option<&[u8]>) -> Option<Reply> {
        self.reply_for_line(cmd.to_string(), stdin)
    }

    fn reply_for_line(&self, line: String, stdin: Option<&[u8]>) -> Option<Reply> {
        self.calls.lock().unwrap().push(Call {
            command: line.clone(),
            stdin: stdin.map(|s| String::from_utf8_lossy(s).into_owned()),
        });
        self.rules
            .iter()
            .find(|(pattern, _)| line.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.command).collect()
    }

    pub fn ran(&self, pattern: &str) -> bool {
        self.commands().iter().any(|c| c.contains(pattern))
    }

    /// Index of the first command containing `pattern`.
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.commands().iter().position(|c| c.contains(pattern))
    }

    pub fn stdin_for(&self, pattern: &str) -> Option<String> {
        self.calls()
            .into_iter()
            .find(|c| c.command.contains(pattern))
            .and_then(|c| c.stdin)
    }
}

#[async_trait]
impl CommandRunner for FakeHost {
    async fn run(&self, cmd: &HostCommand) -> Result<Output, AppError> {
        Ok(self
            .reply_for(cmd, None)
            .map_or_else(|| output(0, "", ""), |r| r.to_output()))
    }

    /// `tee` really writes its input, like on a real host.
    async fn run_with_stdin(&self, cmd: &HostCommand, input: &[u8]) -> Result<Output, AppError> {
        let reply = self.reply_for(cmd, Some(input));
        if let Some(reply) = reply {
            return Ok(reply.to_output());
        }
        if cmd.program == "tee" {
            if let Some(path) = cmd.args.last() {
                std::fs::write(path, input)?;
            }
        }
        Ok(output(0, "", ""))
    }

    async fn run_interactive(&self, cmd: &HostCommand) -> Result<ExitStatus, AppError> {
        Ok(self
            .reply_for(cmd, None)
            .map_or_else(|| exit_status(0), |r| r.to_output().status))
    }

    async fn run_bounded(&self, cmd: &HostCommand, _timeout: Duration) -> Result<Bounded, AppError> {
        Ok(match self.reply_for(cmd, None) {
            None | Some(Reply::TimedOut) => Bounded::TimedOut {
                stdout: Vec::new(),
                stderr: Vec::new(),
            },
            Some(reply) => Bounded::Exited(reply.to_output()),
        })
    }
}

#[async_trait]
impl Downloader for FakeHost {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), AppError> {
        match self.reply_for_line(format!("download {url}"), None) {
            Some(Reply::Fail(code, message)) => Err(AppError::Download {
                url: url.to_string(),
                message: format!("HTTP {code} {message}"),
            }),
            _ => {
                std::fs::write(dest, b"!<arch>\n")?;
                Ok(())
            }
        }
    }
}

/// Install root plus stand-ins for `/etc/systemd/system` and `~/.cloudflared`.
pub struct Sandbox {
    pub root: TempDir,
    pub systemd: TempDir,
    pub tunnel: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("requirements.txt"), "slack_bolt\npython-dotenv\n")
            .unwrap();
        std::fs::write(root.path().join("main.py"), "print('hi')\n").unwrap();
        std::fs::write(
            root.path().join(".env.example"),
            "SLACK_BOT_TOKEN=\nSLACK_SIGNING_SECRET=\nPORT=3000\n",
        )
        .unwrap();
        Self {
            root,
            systemd: tempfile::tempdir().unwrap(),
            tunnel: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    pub fn tunnel_config(&self) -> PathBuf {
        self.tunnel.path().join("config.yml")
    }

    pub fn unit(&self, name: &str) -> PathBuf {
        self.systemd.path().join(format!("{name}.service"))
    }

    pub fn options(&self) -> ProvisionOptions {
        let mut opts = ProvisionOptions::new(self.root().to_path_buf()).unwrap();
        opts.service_user = Some("svc".into());
        opts.systemd_dir = self.systemd.path().to_path_buf();
        opts.tunnel_dir = self.tunnel.path().to_path_buf();
        opts.smoke_timeout = Duration::from_secs(1);
        opts
    }
}

pub fn user() -> HostIdentity {
    HostIdentity {
        user: "svc".into(),
        uid: 1000,
    }
}

pub fn root_user() -> HostIdentity {
    HostIdentity {
        user: "root".into(),
        uid: 0,
    }
}

/// Everything emitted so far on a progress channel.
pub fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut msgs = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        msgs.push(msg);
    }
    msgs
}
