//! agentyard-tools — the worker tool surface
//!
//! Each tool is a self-contained file in src/tools/.
//! To add a tool: create the file, implement Tool trait, register below.
//! To remove a tool: delete the file, remove from mod.rs and registry below.

pub mod registry;
pub mod tools;

pub use registry::{Tool, ToolRegistry, ToolResult};

use std::path::Path;

/// Create the default tool registry with all eight worker tools.
///
/// Edit this function to add or remove tools from the worker.
pub fn create_default_registry(workspace_root: impl AsRef<Path>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let root = workspace_root.as_ref();

    registry.register(tools::read::ReadFileTool::new(root));
    registry.register(tools::write::WriteFileTool::new(root));
    registry.register(tools::edit::EditFileTool::new(root));
    registry.register(tools::list_directory::ListDirectoryTool::new(root));
    registry.register(tools::bash::RunCommandTool::new(root));
    registry.register(tools::git::GitCommitTool::new(root));
    registry.register(tools::git::GitStatusTool::new(root));
    registry.register(tools::task_complete::TaskCompleteTool::new());

    registry
}

/// Create a policy-scoped tool registry.
///
/// Only registers tools whose names appear in `allowed_tools`. Used by worker
/// containers to enforce policy at the tool registration level: if a tool
/// isn't registered, the AI adapter never sees it and can't call it.
pub fn create_policy_registry(workspace_root: impl AsRef<Path>, allowed_tools: &[&str]) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let root = workspace_root.as_ref();

    for name in allowed_tools {
        match *name {
            "read_file" => registry.register(tools::read::ReadFileTool::new(root)),
            "write_file" => registry.register(tools::write::WriteFileTool::new(root)),
            "edit_file" => registry.register(tools::edit::EditFileTool::new(root)),
            "list_directory" => registry.register(tools::list_directory::ListDirectoryTool::new(root)),
            "run_command" => registry.register(tools::bash::RunCommandTool::new(root)),
            "git_commit" => registry.register(tools::git::GitCommitTool::new(root)),
            "git_status" => registry.register(tools::git::GitStatusTool::new(root)),
            "task_complete" => registry.register(tools::task_complete::TaskCompleteTool::new()),
            _ => tracing::warn!("Unknown tool in policy: {}", name),
        }
    }

    registry
}
