//! Host command execution. Steps describe commands as [`HostCommand`] values
//! and hand them to a [`CommandRunner`], which tests replace with a fake.

use async_trait::async_trait;
use slackbot_deploy_core::AppError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;

/// A command to run on this host. `elevated` commands go through `sudo`; the
/// rest run as the invoking user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostCommand {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
    pub elevated: bool,
}

impl HostCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Same command, run through `sudo`.
    pub fn sudo(program: impl Into<String>) -> Self {
        Self {
            elevated: true,
            ..Self::new(program)
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, envs: Vec<(String, String)>) -> Self {
        self.envs = envs;
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Program and arguments as actually executed (`sudo` first if elevated).
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 2);
        if self.elevated {
            argv.push("sudo".to_string());
        }
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    fn to_tokio(&self) -> tokio::process::Command {
        let argv = self.argv();
        let mut cmd = tokio::process::Command::new(&argv[0]);
        cmd.args(&argv[1..]).envs(self.envs.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd.kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> AppError {
        AppError::Spawn {
            command: self.to_string(),
            source,
        }
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// Result of a command that was allowed to run for a bounded time.
#[derive(Debug)]
pub enum Bounded {
    Exited(Output),
    TimedOut { stdout: Vec<u8>, stderr: Vec<u8> },
}

/// Abstracts process execution so steps can be tested without touching the host.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion, capturing stdout and stderr.
    async fn run(&self, cmd: &HostCommand) -> Result<Output, AppError>;

    /// Run to completion with `input` piped to stdin.
    async fn run_with_stdin(&self, cmd: &HostCommand, input: &[u8]) -> Result<Output, AppError>;

    /// Run with the terminal attached (for interactive tools such as
    /// `cloudflared tunnel login`).
    async fn run_interactive(&self, cmd: &HostCommand) -> Result<ExitStatus, AppError>;

    /// Run for at most `timeout`, then kill it.
    async fn run_bounded(&self, cmd: &HostCommand, timeout: Duration) -> Result<Bounded, AppError>;
}

/// Turn a non-zero exit into [`AppError::CommandFailed`].
pub fn check(cmd: &HostCommand, output: Output) -> Result<Output, AppError> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(AppError::CommandFailed {
            command: cmd.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

pub fn check_status(cmd: &HostCommand, status: ExitStatus) -> Result<(), AppError> {
    if status.success() {
        Ok(())
    } else {
        Err(AppError::CommandFailed {
            command: cmd.to_string(),
            code: status.code(),
            stderr: String::new(),
        })
    }
}

/// stdout followed by stderr, lossily decoded.
pub fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

/// Production runner backed by `tokio::process`.
pub struct TokioCommandRunner;

/// How long output readers may keep draining after a bounded child is gone.
/// A descendant that escaped the process group can hold the pipes open
/// indefinitely.
const READER_GRACE: Duration = Duration::from_millis(500);

type Captured = Arc<Mutex<Vec<u8>>>;

fn spawn_reader<R>(handle: Option<R>) -> (Captured, JoinHandle<()>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let buf: Captured = Arc::default();
    let sink = Arc::clone(&buf);
    let task = tokio::spawn(async move {
        let Some(mut h) = handle else { return };
        let mut chunk = [0u8; 4096];
        while let Ok(n) = h.read(&mut chunk).await {
            if n == 0 {
                break;
            }
            if let Ok(mut b) = sink.lock() {
                b.extend_from_slice(&chunk[..n]);
            }
        }
    });
    (buf, task)
}

/// Whatever the reader captured once it hits EOF or the grace period ends.
async fn collect(buf: Captured, task: JoinHandle<()>) -> Vec<u8> {
    let abort = task.abort_handle();
    if tokio::time::timeout(READER_GRACE, task).await.is_err() {
        abort.abort();
    }
    let captured = buf.lock().map(|mut b| std::mem::take(&mut *b)).unwrap_or_default();
    captured
}

/// SIGKILL the child's whole process group so forked workers die with it.
fn kill_group(pid: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) {
            // SAFETY: killpg only sends a signal. The group was created for
            // this child by `process_group(0)`, so its id equals the pid.
            unsafe {
                libc::killpg(pid, libc::SIGKILL);
            }
        }
    }
    #[cfg(not(unix))]
    let _ = pid;
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, cmd: &HostCommand) -> Result<Output, AppError> {
        cmd.to_tokio()
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| cmd.spawn_error(e))
    }

    async fn run_with_stdin(&self, cmd: &HostCommand, input: &[u8]) -> Result<Output, AppError> {
        let mut child = cmd
            .to_tokio()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| cmd.spawn_error(e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input).await?;
            // Dropping stdin closes the pipe so the child sees EOF.
        }
        child
            .wait_with_output()
            .await
            .map_err(|e| cmd.spawn_error(e))
    }

    async fn run_interactive(&self, cmd: &HostCommand) -> Result<ExitStatus, AppError> {
        cmd.to_tokio()
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| cmd.spawn_error(e))
    }

    async fn run_bounded(&self, cmd: &HostCommand, timeout: Duration) -> Result<Bounded, AppError> {
        let mut command = cmd.to_tokio();
        #[cfg(unix)]
        {
            command.process_group(0);
        }
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| cmd.spawn_error(e))?;
        let pid = child.id();

        let (stdout, stdout_task) = spawn_reader(child.stdout.take());
        let (stderr, stderr_task) = spawn_reader(child.stderr.take());

        let exited = tokio::select! {
            status = child.wait() => Some(status.map_err(|e| cmd.spawn_error(e))?),
            () = tokio::time::sleep(timeout) => {
                kill_group(pid);
                let _ = child.kill().await;
                None
            }
        };
        // nothing started for a bounded run may outlive it
        if exited.is_some() {
            kill_group(pid);
        }

        let stdout = collect(stdout, stdout_task).await;
        let stderr = collect(stderr, stderr_task).await;
        Ok(match exited {
            Some(status) => Bounded::Exited(Output {
                status,
                stdout,
                stderr,
            }),
            None => Bounded::TimedOut { stdout, stderr },
        })
    }
}

/// Fetches release artifacts. Kept apart from [`CommandRunner`] so tests can
/// install cloudflared without network access.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Write the body of `url` to `dest`.
    async fn download(&self, url: &str, dest: &Path) -> Result<(), AppError>;
}

/// Plain HTTPS GET via reqwest.
pub struct HttpDownloader;

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), AppError> {
        let failed = |message: String| AppError::Download {
            url: url.to_string(),
            message,
        };
        let resp = reqwest::get(url).await?;
        if !resp.status().is_success() {
            return Err(failed(format!("HTTP {}", resp.status())));
        }
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(failed("empty response body".into()));
        }
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }
}
