//! edit_file — apply a sequence of exact find/replace edits to a file

use crate::registry::{Tool, ToolResult};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

#[derive(Deserialize)]
struct FileEdit {
    #[serde(rename = "oldString")]
    old_string: String,
    #[serde(rename = "newString")]
    new_string: String,
    #[serde(rename = "replaceAll", default)]
    replace_all: bool,
}

pub struct EditFileTool {
    workspace_root: PathBuf,
}

impl EditFileTool {
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

/// Applies one edit to `content`. The old string must be unique unless
/// `replace_all` is set.
fn apply_edit(content: &str, edit: &FileEdit) -> Result<String, String> {
    if !content.contains(edit.old_string.as_str()) {
        return Err(format!("oldString not found: {:?}", truncate(&edit.old_string)));
    }
    if edit.replace_all {
        Ok(content.replace(&edit.old_string, &edit.new_string))
    } else {
        let count = content.matches(edit.old_string.as_str()).count();
        if count > 1 {
            return Err(format!(
                "oldString found {} times — must be unique, or set replaceAll: {:?}",
                count,
                truncate(&edit.old_string)
            ));
        }
        Ok(content.replacen(&edit.old_string, &edit.new_string, 1))
    }
}

fn truncate(s: &str) -> &str {
    &s[..s.len().min(60)]
}

#[async_trait::async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit a file by applying a sequence of exact string replacements. \
         Each edit's oldString must appear exactly once unless replaceAll is set."
    }

    fn prompt(&self) -> &str {
        "Always read a file before editing it. oldString must match exactly, \
         including whitespace and indentation."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to edit"
                },
                "edits": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "oldString": { "type": "string" },
                            "newString": { "type": "string" },
                            "replaceAll": { "type": "boolean" }
                        },
                        "required": ["oldString", "newString"]
                    }
                }
            },
            "required": ["path", "edits"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let path = match args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return ToolResult::error("Missing required parameter: path"),
        };
        let edits: Vec<FileEdit> = match args.get("edits").cloned() {
            Some(v) => match serde_json::from_value(v) {
                Ok(edits) => edits,
                Err(e) => return ToolResult::error(format!("Invalid edits: {}", e)),
            },
            None => return ToolResult::error("Missing required parameter: edits"),
        };
        if edits.is_empty() {
            return ToolResult::error("edits must contain at least one edit");
        }

        let full_path = self.resolve_path(path);

        let mut content = match fs::read_to_string(&full_path).await {
            Ok(c) => c,
            Err(e) => {
                return ToolResult::Json(json!({
                    "success": false,
                    "error": format!("failed to read {}: {}", path, e),
                }))
            }
        };

        for edit in &edits {
            content = match apply_edit(&content, edit) {
                Ok(c) => c,
                Err(e) => return ToolResult::Json(json!({ "success": false, "error": e })),
            };
        }

        match fs::write(&full_path, &content).await {
            Ok(()) => {
                debug!("edit_file: {} ({} edits)", path, edits.len());
                ToolResult::Json(json!({ "success": true }))
            }
            Err(e) => ToolResult::Json(json!({
                "success": false,
                "error": format!("failed to write {}: {}", path, e),
            })),
        }
    }
}
