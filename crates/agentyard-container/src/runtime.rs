//! ContainerRuntime — three runtime modes behind one narrow
//! interface. Command execution spawns with piped stdout/stderr and
//! `kill_on_drop(true)`, races against a timeout, and drains the pipes
//! manually after `child.wait()` rather than `wait_with_output()` so a
//! timed-out child can still be killed.

use crate::command::{validate_command, DEFAULT_ALLOW};
use agentyard_core::config::ContainerRuntimeMode;
use agentyard_core::{Error, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Options assembled by `WorkerContainer::create` and passed down to
/// the runtime, which only knows how to turn them into CLI arguments.
#[derive(Clone, Debug, Default)]
pub struct CreateOptions {
    pub name: String,
    pub image: String,
    pub env: HashMap<String, String>,
    pub volumes: Vec<(String, String, bool)>, // (host_path, container_path, read_only)
    pub network_mode: String,
    pub security_opts: Vec<String>,
    pub cap_drop: Vec<String>,
    pub pids_limit: Option<u32>,
    pub tmpfs: Vec<(String, String)>, // (mount_path, options)
    pub read_only_root: bool,
    pub work_dir: Option<String>,
}

impl CreateOptions {
    fn to_argv(&self) -> Vec<String> {
        let mut argv = vec!["run".to_string(), "-d".to_string(), "--name".to_string(), self.name.clone()];

        if !self.network_mode.is_empty() {
            argv.push("--network".to_string());
            argv.push(self.network_mode.clone());
        }
        for opt in &self.security_opts {
            argv.push("--security-opt".to_string());
            argv.push(opt.clone());
        }
        for cap in &self.cap_drop {
            argv.push("--cap-drop".to_string());
            argv.push(cap.clone());
        }
        if let Some(limit) = self.pids_limit {
            argv.push("--pids-limit".to_string());
            argv.push(limit.to_string());
        }
        for (path, opts) in &self.tmpfs {
            argv.push("--tmpfs".to_string());
            argv.push(format!("{}:{}", path, opts));
        }
        if self.read_only_root {
            argv.push("--read-only".to_string());
        }
        if let Some(wd) = &self.work_dir {
            argv.push("-w".to_string());
            argv.push(wd.clone());
        }
        for (host, container, ro) in &self.volumes {
            let mode = if *ro { "ro" } else { "rw" };
            argv.push("-v".to_string());
            argv.push(format!("{}:{}:{}", host, container, mode));
        }
        for (k, v) in &self.env {
            argv.push("-e".to_string());
            argv.push(format!("{}={}", k, v));
        }
        argv.push(self.image.clone());
        argv
    }
}

/// Result of executing a container CLI command: captured
/// stdout+stderr+exit code.
#[derive(Clone, Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

#[async_trait::async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn create_container(&self, opts: CreateOptions) -> Result<String>;
    async fn stop_container(&self, id: &str) -> Result<()>;
    async fn remove_container(&self, id: &str) -> Result<()>;
    async fn get_container_logs(&self, id: &str, tail: Option<usize>) -> Result<String>;
    async fn inspect_container(&self, id: &str) -> Result<serde_json::Value>;
}

/// Host-socket mode (default): every command is validated against the
/// allow/deny sets before it is ever spawned.
pub struct HostSocketRuntime {
    cli_name: String,
    allow_set: Vec<String>,
    timeout: Duration,
}

impl HostSocketRuntime {
    pub fn new(allow_set: Vec<String>) -> Self {
        Self { cli_name: "docker".to_string(), allow_set, timeout: Duration::from_secs(60) }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn validate(&self, argv: &[String]) -> Result<()> {
        let joined = argv.join(" ");
        let command = format!("{} {}", self.cli_name, joined);
        let validation = validate_command(&command, &self.cli_name, &self.allow_set);
        if !validation.valid {
            return Err(Error::disallowed_command(
                validation.detected_command.unwrap_or_default(),
                self.allow_set.join(", "),
            ));
        }
        Ok(())
    }

    async fn run(&self, argv: Vec<String>) -> Result<CommandOutput> {
        self.validate(&argv)?;

        debug!(cli = %self.cli_name, args = ?argv, "executing container command");

        let mut child = Command::new(&self.cli_name)
            .args(&argv)
            .kill_on_drop(true)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| Error::ContainerError(format!("failed to spawn {}: {}", self.cli_name, e)))?;

        let wait = tokio::time::timeout(self.timeout, child.wait()).await;
        match wait {
            Ok(Ok(status)) => {
                let mut stdout = String::new();
                let mut stderr = String::new();
                if let Some(mut pipe) = child.stdout.take() {
                    let _ = pipe.read_to_string(&mut stdout).await;
                }
                if let Some(mut pipe) = child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr).await;
                }
                let output = CommandOutput { stdout, stderr: stderr.clone(), exit_code: status.code() };
                if !status.success() {
                    return Err(Error::ContainerError(format!(
                        "command exited with {:?}: {}",
                        status.code(),
                        stderr
                    )));
                }
                Ok(output)
            }
            Ok(Err(e)) => Err(Error::ContainerError(format!("failed to wait on child: {}", e))),
            Err(_) => {
                warn!(cli = %self.cli_name, "container command timed out, killing child");
                let _ = child.kill().await;
                Err(Error::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait::async_trait]
impl ContainerRuntime for HostSocketRuntime {
    async fn create_container(&self, opts: CreateOptions) -> Result<String> {
        let output = self.run(opts.to_argv()).await?;
        Ok(output.stdout.trim().to_string())
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        self.run(vec!["stop".to_string(), id.to_string()]).await.map(|_| ())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.run(vec!["rm".to_string(), "-f".to_string(), id.to_string()]).await.map(|_| ())
    }

    async fn get_container_logs(&self, id: &str, tail: Option<usize>) -> Result<String> {
        let mut argv = vec!["logs".to_string()];
        if let Some(n) = tail {
            argv.push("--tail".to_string());
            argv.push(n.to_string());
        }
        argv.push(id.to_string());
        Ok(self.run(argv).await?.stdout)
    }

    async fn inspect_container(&self, id: &str) -> Result<serde_json::Value> {
        let output = self.run(vec!["inspect".to_string(), id.to_string()]).await?;
        serde_json::from_str(&output.stdout).map_err(Error::from)
    }
}

/// Rootless/nested modes bypass command validation entirely:
/// the runtime itself is the sandbox, so there is no CLI allow-listing to
/// enforce. Both still shell out to the same CLI; only the skipped
/// validation step differs from `HostSocketRuntime`.
pub struct BypassValidationRuntime {
    cli_name: String,
    timeout: Duration,
}

impl BypassValidationRuntime {
    pub fn new(mode: ContainerRuntimeMode) -> Self {
        let cli_name = match mode {
            ContainerRuntimeMode::Rootless => "podman".to_string(),
            ContainerRuntimeMode::Nested => "docker".to_string(),
            ContainerRuntimeMode::HostSocket => "docker".to_string(),
        };
        Self { cli_name, timeout: Duration::from_secs(60) }
    }

    async fn run(&self, argv: Vec<String>) -> Result<CommandOutput> {
        let mut child = Command::new(&self.cli_name)
            .args(&argv)
            .kill_on_drop(true)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| Error::ContainerError(format!("failed to spawn {}: {}", self.cli_name, e)))?;

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => {
                let mut stdout = String::new();
                let mut stderr = String::new();
                if let Some(mut pipe) = child.stdout.take() {
                    let _ = pipe.read_to_string(&mut stdout).await;
                }
                if let Some(mut pipe) = child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr).await;
                }
                if !status.success() {
                    return Err(Error::ContainerError(format!("command exited with {:?}: {}", status.code(), stderr)));
                }
                Ok(CommandOutput { stdout, stderr, exit_code: status.code() })
            }
            Ok(Err(e)) => Err(Error::ContainerError(format!("failed to wait on child: {}", e))),
            Err(_) => {
                let _ = child.kill().await;
                Err(Error::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait::async_trait]
impl ContainerRuntime for BypassValidationRuntime {
    async fn create_container(&self, opts: CreateOptions) -> Result<String> {
        Ok(self.run(opts.to_argv()).await?.stdout.trim().to_string())
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        self.run(vec!["stop".to_string(), id.to_string()]).await.map(|_| ())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.run(vec!["rm".to_string(), "-f".to_string(), id.to_string()]).await.map(|_| ())
    }

    async fn get_container_logs(&self, id: &str, tail: Option<usize>) -> Result<String> {
        let mut argv = vec!["logs".to_string()];
        if let Some(n) = tail {
            argv.push("--tail".to_string());
            argv.push(n.to_string());
        }
        argv.push(id.to_string());
        Ok(self.run(argv).await?.stdout)
    }

    async fn inspect_container(&self, id: &str) -> Result<serde_json::Value> {
        let output = self.run(vec!["inspect".to_string(), id.to_string()]).await?;
        serde_json::from_str(&output.stdout).map_err(Error::from)
    }
}

/// Builds the runtime matching a `SystemConfig`'s `containerRuntime` mode.
pub fn build_runtime(mode: ContainerRuntimeMode, allowed_commands: Vec<String>) -> Box<dyn ContainerRuntime> {
    match mode {
        ContainerRuntimeMode::HostSocket => Box::new(HostSocketRuntime::new(allowed_commands)),
        other => Box::new(BypassValidationRuntime::new(other)),
    }
}

/// Default allow set, re-exported for callers that build a `HostSocketRuntime` directly.
pub fn default_allow_set() -> Vec<String> {
    DEFAULT_ALLOW.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_options_builds_expected_flags() {
        let mut opts = CreateOptions {
            name: "agentcompany-worker-w1-123-abcdef".to_string(),
            image: "agentcompany/worker:latest".to_string(),
            network_mode: "none".to_string(),
            security_opts: vec!["no-new-privileges:true".to_string()],
            cap_drop: vec!["ALL".to_string()],
            pids_limit: Some(256),
            tmpfs: vec![("/tmp".to_string(), "rw,noexec,nosuid,size=256m".to_string())],
            read_only_root: false,
            work_dir: Some("/workspace".to_string()),
            ..Default::default()
        };
        opts.env.insert("WORKER_ID".to_string(), "w1".to_string());
        let argv = opts.to_argv();
        assert!(argv.contains(&"--network".to_string()));
        assert!(argv.contains(&"none".to_string()));
        assert!(argv.contains(&"--cap-drop".to_string()));
        assert!(argv.contains(&"--pids-limit".to_string()));
        assert_eq!(argv.last().unwrap(), "agentcompany/worker:latest");
    }

    #[tokio::test]
    async fn host_socket_runtime_rejects_disallowed_subcommand_before_spawning() {
        let runtime = HostSocketRuntime::new(default_allow_set());
        let result = runtime.run(vec!["exec".to_string(), "-it".to_string(), "c".to_string()]).await;
        match result {
            Err(Error::DisallowedCommand { detected, .. }) => assert_eq!(detected, "exec"),
            other => panic!("expected DisallowedCommand, got {:?}", other.map(|_| ())),
        }
    }
}
