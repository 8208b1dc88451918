//! Snap-based toolchain provisioner
//!
//! Implements the ToolchainProvisioner trait on Ubuntu runners: snapd from
//! apt, LXD and charmcraft from the snap store.

use crate::error::{PackError, PackResult};
use crate::orchestration::build_error_output;
use crate::orchestration::provisioner::ToolchainProvisioner;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Provisioner using `snap` and `sudo` on the host
pub struct SnapProvisioner {
    snap: String,
    tool: String,
    group: String,
}

impl SnapProvisioner {
    /// Create a provisioner.
    ///
    /// `tool` is the snap name of the packaging CLI; `group` is the group
    /// the invoking user is added to for hypervisor access (empty skips).
    pub fn new(snap: impl Into<String>, tool: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            snap: snap.into(),
            tool: tool.into(),
            group: group.into(),
        }
    }

    /// Check whether a command exits successfully, hiding its output
    async fn succeeds(program: &str, args: &[&str]) -> bool {
        Command::new(program)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Run a command, failing with its output tail on non-zero exit
    async fn exec(program: &str, args: &[&str]) -> PackResult<()> {
        let command = format!("{} {}", program, args.join(" "));
        debug!("Executing: {}", command);

        let output = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PackError::command_failed(&command, e))?;

        if output.status.success() {
            Ok(())
        } else {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(PackError::command_exec(
                command,
                build_error_output(&stdout, &stderr),
            ))
        }
    }

    async fn snap_installed(&self, name: &str) -> bool {
        Self::succeeds(&self.snap, &["list", name]).await
    }
}

impl Default for SnapProvisioner {
    fn default() -> Self {
        Self::new("snap", "charmcraft", "lxd")
    }
}

#[async_trait]
impl ToolchainProvisioner for SnapProvisioner {
    async fn ensure_daemon_ready(&self) -> PackResult<()> {
        if Self::succeeds(&self.snap, &["version"]).await {
            debug!("snapd already available");
            return Ok(());
        }

        info!("Installing snapd");
        Self::exec("sudo", &["apt-get", "install", "-y", "snapd"]).await?;
        Self::exec("sudo", &[self.snap.as_str(), "wait", "system", "seed.loaded"]).await
    }

    async fn ensure_hypervisor_ready(&self) -> PackResult<()> {
        if !self.snap_installed("lxd").await {
            info!("Installing LXD");
            Self::exec("sudo", &[self.snap.as_str(), "install", "lxd"]).await?;
            Self::exec("sudo", &["lxd", "waitready"]).await?;
            Self::exec("sudo", &["lxd", "init", "--auto"]).await?;
        } else {
            debug!("LXD already installed");
            Self::exec("sudo", &["lxd", "waitready"]).await?;
        }

        if self.group.is_empty() {
            return Ok(());
        }
        match std::env::var("USER") {
            Ok(user) if !user.is_empty() => {
                Self::exec("sudo", &["usermod", "-aG", self.group.as_str(), user.as_str()]).await
            }
            _ => {
                debug!("USER not set, not adding to group {}", self.group);
                Ok(())
            }
        }
    }

    async fn ensure_tool_installed(&self, channel: &str, revision: &str) -> PackResult<()> {
        let installed = self.snap_installed(&self.tool).await;
        let args = tool_install_args(&self.snap, &self.tool, channel, revision, installed);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        info!(
            "{} {} from {}",
            if installed { "Refreshing" } else { "Installing" },
            self.tool,
            selector_description(channel, revision)
        );
        Self::exec("sudo", &args).await
    }

    fn provisioner_name(&self) -> &'static str {
        "snap"
    }
}

/// Arguments to `sudo` that install or refresh the tool snap
fn tool_install_args(
    snap: &str,
    tool: &str,
    channel: &str,
    revision: &str,
    installed: bool,
) -> Vec<String> {
    let mut args = vec![snap.to_string()];
    if installed {
        args.push("refresh".to_string());
        args.push(tool.to_string());
    } else {
        args.push("install".to_string());
        args.push(tool.to_string());
        args.push("--classic".to_string());
    }

    if revision.is_empty() {
        args.push("--channel".to_string());
        args.push(channel.to_string());
    } else {
        args.push("--revision".to_string());
        args.push(revision.to_string());
    }
    args
}

fn selector_description(channel: &str, revision: &str) -> String {
    if revision.is_empty() {
        format!("channel {}", channel)
    } else {
        format!("revision {}", revision)
    }
}
