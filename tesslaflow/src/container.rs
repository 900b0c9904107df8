//! Lifecycle of the persistent toolchain container.
//!
//! Stage commands run in throwaway `--rm` containers; this named container is
//! started once per session so the image is warm, and removed on shutdown.

use crate::config::ContainerConfig;
use crate::core::CommandSpec;
use std::io;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

/// What a container command reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
    /// The command line that was run.
    pub command: String,
    /// Whether docker exited successfully.
    pub success: bool,
    /// Docker's stderr, trimmed.
    pub stderr: String,
}

/// `docker run -tid --name <name> <image> sh`
#[must_use]
pub fn start_command(config: &ContainerConfig) -> CommandSpec {
    CommandSpec::new(&config.docker)
        .args(["run", "-tid", "--name"])
        .arg(&config.name)
        .arg(&config.image)
        .arg("sh")
}

/// `docker rm -f <name>`
#[must_use]
pub fn remove_command(config: &ContainerConfig) -> CommandSpec {
    CommandSpec::new(&config.docker)
        .args(["rm", "-f"])
        .arg(&config.name)
}

/// Starts the named container in the background.
///
/// A container of the same name that already exists makes docker fail;
/// that is reported in the status, not as an error.
pub async fn start_container(config: &ContainerConfig) -> io::Result<ContainerStatus> {
    run(start_command(config)).await
}

/// Force-removes the named container.
pub async fn remove_container(config: &ContainerConfig) -> io::Result<ContainerStatus> {
    run(remove_command(config)).await
}

async fn run(spec: CommandSpec) -> io::Result<ContainerStatus> {
    let command = spec.to_string();
    let output = Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::null())
        .output()
        .await?;

    let status = ContainerStatus {
        command,
        success: output.status.success(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    };
    if status.success {
        info!(command = %status.command, "Container command succeeded");
    } else {
        warn!(command = %status.command, stderr = %status.stderr, "Container command failed");
    }
    Ok(status)
}
