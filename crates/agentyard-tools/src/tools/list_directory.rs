//! list_directory — list the entries of a directory

use crate::registry::{Tool, ToolResult};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct ListDirectoryTool {
    workspace_root: PathBuf,
}

impl ListDirectoryTool {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
        }
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.workspace_root.join(path)
        }
    }
}

#[async_trait::async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory, one level deep."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the directory to list"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let path = match args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return ToolResult::error("Missing required parameter: path"),
        };

        let full_path = self.resolve_path(path);

        let mut read_dir = match fs::read_dir(&full_path).await {
            Ok(rd) => rd,
            Err(e) => {
                return ToolResult::Json(json!({
                    "entries": [],
                    "error": format!("failed to list {}: {}", path, e),
                }))
            }
        };

        let mut entries = Vec::new();
        loop {
            let next = match read_dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return ToolResult::Json(json!({
                        "entries": entries,
                        "error": format!("error while listing {}: {}", path, e),
                    }))
                }
            };
            let is_dir = next.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push(json!({
                "name": next.file_name().to_string_lossy(),
                "isDirectory": is_dir,
            }));
        }
        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

        ToolResult::Json(json!({ "entries": entries }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn lists_files_and_directories() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "x").await.unwrap();
        tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();

        let tool = ListDirectoryTool::new(dir.path());
        let result = tool.execute(json!({ "path": "." })).await;
        match result {
            ToolResult::Json(v) => {
                let entries = v["entries"].as_array().unwrap();
                assert_eq!(entries.len(), 2);
                let sub = entries.iter().find(|e| e["name"] == "sub").unwrap();
                assert_eq!(sub["isDirectory"], true);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
