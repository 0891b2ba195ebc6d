//! run_command — execute shell commands with timeout and cancellation

use crate::registry::{Tool, ToolResult};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct RunCommandTool {
    workspace_root: PathBuf,
    default_timeout_secs: u64,
}

impl RunCommandTool {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
            default_timeout_secs: 120,
        }
    }
}

#[async_trait::async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str { "run_command" }

    fn description(&self) -> &str {
        "Execute a shell command in the workspace. Captures stdout and stderr. \
         Set timeout in seconds (default 120)."
    }

    fn prompt(&self) -> &str {
        "Use run_command for terminal operations. Quote paths with spaces. \
         Prefer read_file, write_file, edit_file, and list_directory over their \
         run_command equivalents."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (default 120, max 600)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let command = match args["command"].as_str() {
            Some(c) => c,
            None => return ToolResult::error("Missing required parameter: command"),
        };

        let timeout_secs = args["timeout"].as_u64()
            .unwrap_or(self.default_timeout_secs)
            .min(600);

        debug!("run_command: {}", &command[..command.len().min(80)]);

        let output = match tokio::time::timeout(
            std::time::Duration::from_secs(timeout_secs),
            Command::new("bash")
                .arg("-c")
                .arg(command)
                .current_dir(&self.workspace_root)
                .output()
        ).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ToolResult::error(format!("Failed to execute: {}", e)),
            Err(_) => return ToolResult::Json(json!({
                "stdout": "",
                "stderr": "",
                "exitCode": null,
                "timedOut": true,
            })),
        };

        format_output(&output, false)
    }

    /// Cancellable execution: spawns the process with kill_on_drop(true) and
    /// races against the CancellationToken. On cancellation, the child process
    /// is killed immediately.
    async fn execute_cancellable(
        &self,
        args: Value,
        cancel: CancellationToken,
    ) -> ToolResult {
        let command = match args["command"].as_str() {
            Some(c) => c,
            None => return ToolResult::error("Missing required parameter: command"),
        };

        let timeout_secs = args["timeout"].as_u64()
            .unwrap_or(self.default_timeout_secs)
            .min(600);

        debug!("run_command (cancellable): {}", &command[..command.len().min(80)]);

        let mut child = match Command::new("bash")
            .arg("-c")
            .arg(command)
            .current_dir(&self.workspace_root)
            .kill_on_drop(true)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return ToolResult::error(format!("Failed to spawn: {}", e)),
        };

        // Race: wait for the process vs cancellation vs timeout.
        // We use wait() + manual stdout/stderr reading instead of wait_with_output()
        // because wait_with_output() takes ownership and prevents kill-on-cancel.
        let timeout_duration = std::time::Duration::from_secs(timeout_secs);

        tokio::select! {
            result = async {
                tokio::time::timeout(timeout_duration, child.wait()).await
            } => {
                match result {
                    Ok(Ok(status)) => {
                        // Process exited — read stdout/stderr
                        let stdout = read_pipe(child.stdout.take()).await;
                        let stderr = read_pipe(child.stderr.take()).await;
                        let output = std::process::Output {
                            status,
                            stdout: stdout.into_bytes(),
                            stderr: stderr.into_bytes(),
                        };
                        format_output(&output, false)
                    }
                    Ok(Err(e)) => ToolResult::error(format!("Failed to wait: {}", e)),
                    Err(_) => {
                        // Timeout — kill the process
                        let _ = child.kill().await;
                        ToolResult::Json(json!({
                            "stdout": "",
                            "stderr": "",
                            "exitCode": null,
                            "timedOut": true,
                        }))
                    }
                }
            }
            _ = cancel.cancelled() => {
                // Interrupted by human — kill the process immediately
                let _ = child.kill().await;
                ToolResult::Json(json!({
                    "stdout": "",
                    "stderr": "[process killed by interrupt]",
                    "exitCode": null,
                    "timedOut": false,
                }))
            }
        }
    }
}

/// Read all bytes from an optional child pipe into a string.
async fn read_pipe(pipe: Option<impl tokio::io::AsyncRead + Unpin>) -> String {
    use tokio::io::AsyncReadExt;
    match pipe {
        Some(mut p) => {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).to_string()
        }
        None => String::new(),
    }
}

const MAX_OUTPUT_CHARS: usize = 30_000;

fn truncate_output(s: &str) -> String {
    if s.len() > MAX_OUTPUT_CHARS {
        format!("{}\n... [truncated, {} total chars]", &s[..MAX_OUTPUT_CHARS], s.len())
    } else {
        s.to_string()
    }
}

fn format_output(output: &std::process::Output, timed_out: bool) -> ToolResult {
    ToolResult::Json(json!({
        "stdout": truncate_output(&String::from_utf8_lossy(&output.stdout)),
        "stderr": truncate_output(&String::from_utf8_lossy(&output.stderr)),
        "exitCode": output.status.code(),
        "timedOut": timed_out,
    }))
}
