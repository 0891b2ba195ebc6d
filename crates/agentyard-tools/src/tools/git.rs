//! git_commit / git_status — the worker's version-control surface
//!
//! Shells out to the `git` binary the same way run_command shells out to
//! bash: spawn, capture output, interpret the exit code.

use crate::registry::{Tool, ToolResult};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

async fn run_git(workspace_root: &Path, args: &[&str]) -> Result<std::process::Output, String> {
    Command::new("git")
        .args(args)
        .current_dir(workspace_root)
        .output()
        .await
        .map_err(|e| format!("failed to spawn git: {}", e))
}

pub struct GitCommitTool {
    workspace_root: PathBuf,
}

impl GitCommitTool {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for GitCommitTool {
    fn name(&self) -> &str {
        "git_commit"
    }

    fn description(&self) -> &str {
        "Stage and commit changes in the workspace repository. If files is \
         omitted, stages all tracked and untracked changes."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Commit message"
                },
                "files": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Paths to stage before committing (default: all changes)"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let message = match args.get("message").and_then(|v| v.as_str()) {
            Some(m) => m,
            None => return ToolResult::error("Missing required parameter: message"),
        };
        let files: Vec<String> = args
            .get("files")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        let add_args: Vec<&str> = if files.is_empty() {
            vec!["add", "-A"]
        } else {
            let mut v = vec!["add"];
            v.extend(files.iter().map(String::as_str));
            v
        };

        if let Err(e) = run_git(&self.workspace_root, &add_args).await {
            return ToolResult::Json(json!({ "commitHash": null, "error": e }));
        }

        let commit = match run_git(&self.workspace_root, &["commit", "-m", message]).await {
            Ok(output) => output,
            Err(e) => return ToolResult::Json(json!({ "commitHash": null, "error": e })),
        };

        if !commit.status.success() {
            let stderr = String::from_utf8_lossy(&commit.stderr);
            let stdout = String::from_utf8_lossy(&commit.stdout);
            return ToolResult::Json(json!({
                "commitHash": null,
                "error": format!("git commit failed: {}{}", stdout.trim(), stderr.trim()),
            }));
        }

        match run_git(&self.workspace_root, &["rev-parse", "HEAD"]).await {
            Ok(output) if output.status.success() => {
                let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
                debug!("git_commit: {}", hash);
                ToolResult::Json(json!({ "commitHash": hash }))
            }
            Ok(output) => ToolResult::Json(json!({
                "commitHash": null,
                "error": format!("git rev-parse failed: {}", String::from_utf8_lossy(&output.stderr)),
            })),
            Err(e) => ToolResult::Json(json!({ "commitHash": null, "error": e })),
        }
    }
}

pub struct GitStatusTool {
    workspace_root: PathBuf,
}

impl GitStatusTool {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for GitStatusTool {
    fn name(&self) -> &str {
        "git_status"
    }

    fn description(&self) -> &str {
        "Report the current branch and the modified, staged, and untracked files."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value) -> ToolResult {
        let branch = match run_git(&self.workspace_root, &["rev-parse", "--abbrev-ref", "HEAD"]).await {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            }
            Ok(output) => return ToolResult::error(format!(
                "git rev-parse failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )),
            Err(e) => return ToolResult::error(e),
        };

        let status = match run_git(&self.workspace_root, &["status", "--porcelain=v1"]).await {
            Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout).to_string(),
            Ok(output) => return ToolResult::error(format!(
                "git status failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )),
            Err(e) => return ToolResult::error(e),
        };

        let mut modified = Vec::new();
        let mut staged = Vec::new();
        let mut untracked = Vec::new();

        for line in status.lines() {
            if line.len() < 3 {
                continue;
            }
            let index_state = line.as_bytes()[0] as char;
            let worktree_state = line.as_bytes()[1] as char;
            let path = line[3..].to_string();

            if index_state == '?' && worktree_state == '?' {
                untracked.push(path);
                continue;
            }
            if index_state != ' ' {
                staged.push(path.clone());
            }
            if worktree_state != ' ' {
                modified.push(path);
            }
        }

        ToolResult::Json(json!({
            "branch": branch,
            "modified": modified,
            "staged": staged,
            "untracked": untracked,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn init_repo(dir: &Path) {
        run_git(dir, &["init", "-q"]).await.unwrap();
        run_git(dir, &["config", "user.email", "worker@example.com"]).await.unwrap();
        run_git(dir, &["config", "user.name", "worker"]).await.unwrap();
    }

    #[tokio::test]
    async fn commits_staged_changes_and_returns_hash() {
        let dir = tempdir().unwrap();
        init_repo(dir.path()).await;
        tokio::fs::write(dir.path().join("a.txt"), "hi").await.unwrap();

        let tool = GitCommitTool::new(dir.path());
        let result = tool.execute(json!({ "message": "add a.txt" })).await;
        match result {
            ToolResult::Json(v) => assert!(v["commitHash"].as_str().unwrap().len() >= 7),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn status_reports_untracked_files() {
        let dir = tempdir().unwrap();
        init_repo(dir.path()).await;
        tokio::fs::write(dir.path().join("a.txt"), "hi").await.unwrap();

        let tool = GitStatusTool::new(dir.path());
        let result = tool.execute(json!({})).await;
        match result {
            ToolResult::Json(v) => {
                let untracked = v["untracked"].as_array().unwrap();
                assert!(untracked.iter().any(|p| p == "a.txt"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
