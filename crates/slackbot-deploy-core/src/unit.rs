//! systemd unit descriptors for the bot and the tunnel client.

use crate::config::{
    CLOUDFLARED_BIN, ENTRY_POINT, ENV_FILE, RESTART_SEC, SYSTEMD_DIR, VENV_DIR,
};
use std::path::{Path, PathBuf};

/// PATH handed to supervised processes, with the bot's venv first.
const BASE_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    pub name: String,
    pub description: String,
    pub user: String,
    pub install_root: PathBuf,
    pub exec_start: String,
}

impl UnitSpec {
    /// Unit running the bot's entry point with the venv interpreter.
    pub fn app(name: &str, install_root: &Path, user: &str) -> Self {
        let python = install_root.join(VENV_DIR).join("bin").join("python");
        let entry = install_root.join(ENTRY_POINT);
        Self {
            name: name.to_string(),
            description: "Slack Bot".to_string(),
            user: user.to_string(),
            install_root: install_root.to_path_buf(),
            exec_start: format!("{} {}", python.display(), entry.display()),
        }
    }

    /// Unit running `cloudflared tunnel run` against the routing config.
    pub fn tunnel(
        name: &str,
        install_root: &Path,
        user: &str,
        config_path: &Path,
        tunnel_name: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: "Cloudflare Tunnel for Slack Bot".to_string(),
            user: user.to_string(),
            install_root: install_root.to_path_buf(),
            exec_start: format!(
                "{CLOUDFLARED_BIN} tunnel --config {} run {tunnel_name}",
                config_path.display()
            ),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.service", self.name)
    }

    /// Where the unit lives under `systemd_dir` (normally `/etc/systemd/system`).
    pub fn path_in(&self, systemd_dir: &Path) -> PathBuf {
        systemd_dir.join(self.file_name())
    }

    pub fn default_path(&self) -> PathBuf {
        self.path_in(Path::new(SYSTEMD_DIR))
    }

    pub fn render(&self) -> String {
        let root = self.install_root.display();
        let venv_bin = self.install_root.join(VENV_DIR).join("bin");
        format!(
            r#"[Unit]
Description={description}
After=network.target

[Service]
Type=simple
User={user}
WorkingDirectory={root}
EnvironmentFile={env_file}
Environment="PATH={venv_bin}:{BASE_PATH}"
ExecStart={exec_start}
Restart=always
RestartSec={RESTART_SEC}

[Install]
WantedBy=multi-user.target
"#,
            description = self.description,
            user = self.user,
            env_file = self.install_root.join(ENV_FILE).display(),
            venv_bin = venv_bin.display(),
            exec_start = self.exec_start,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field<'a>(unit: &'a str, key: &str) -> Vec<&'a str> {
        let prefix = format!("{key}=");
        unit.lines()
            .filter_map(|l| l.strip_prefix(prefix.as_str()))
            .collect()
    }

    #[test]
    fn app_unit_carries_root_user_env_and_restart_policy() {
        let unit = UnitSpec::app("slackbot", Path::new("/opt/SlackBot"), "svc").render();

        assert_eq!(field(&unit, "WorkingDirectory"), ["/opt/SlackBot"]);
        assert_eq!(field(&unit, "User"), ["svc"]);
        assert_eq!(field(&unit, "EnvironmentFile"), ["/opt/SlackBot/.env"]);
        assert_eq!(field(&unit, "Restart"), ["always"]);
        assert_eq!(field(&unit, "RestartSec"), ["10"]);
        assert_eq!(field(&unit, "After"), ["network.target"]);
        assert_eq!(field(&unit, "Type"), ["simple"]);
        assert_eq!(
            field(&unit, "ExecStart"),
            ["/opt/SlackBot/venv/bin/python /opt/SlackBot/main.py"]
        );
        assert_eq!(
            field(&unit, "Environment"),
            [format!("\"PATH=/opt/SlackBot/venv/bin:{BASE_PATH}\"").as_str()]
        );
    }

    #[test]
    fn tunnel_unit_differs_only_in_description_and_exec_start() {
        let root = Path::new("/opt/SlackBot");
        let app = UnitSpec::app("slackbot", root, "svc").render();
        let tunnel = UnitSpec::tunnel(
            "cloudflared",
            root,
            "svc",
            Path::new("/home/svc/.cloudflared/config.yml"),
            "slackbot",
        )
        .render();

        assert_eq!(
            field(&tunnel, "ExecStart"),
            ["/usr/bin/cloudflared tunnel --config /home/svc/.cloudflared/config.yml run slackbot"]
        );
        let differing: Vec<_> = app
            .lines()
            .zip(tunnel.lines())
            .filter(|(a, t)| a != t)
            .map(|(a, _)| a.split('=').next().unwrap_or_default())
            .collect();
        assert_eq!(differing, ["Description", "ExecStart"]);
    }

    #[test]
    fn unit_path_uses_service_suffix() {
        let spec = UnitSpec::app("slackbot", Path::new("/srv/bot"), "svc");
        assert_eq!(
            spec.default_path(),
            PathBuf::from("/etc/systemd/system/slackbot.service")
        );
    }
}
