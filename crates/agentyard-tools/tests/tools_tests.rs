//! Tests for agentyard-tools: ToolResult, ToolRegistry, and all eight worker
//! tools against a real filesystem.

use agentyard_tools::*;
use serde_json::json;
use std::path::PathBuf;

fn test_workspace() -> PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH).unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("agentyard-tools-test-{}-{}", std::process::id(), id));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn cleanup(dir: &std::path::Path) {
    let _ = std::fs::remove_dir_all(dir);
}

// ===========================================================================
// ToolResult
// ===========================================================================

#[test]
fn tool_result_text() {
    let r = ToolResult::text("hello");
    assert!(!r.is_error());
    assert_eq!(r.to_content_string(), "hello");
}

#[test]
fn tool_result_error() {
    let r = ToolResult::error("boom");
    assert!(r.is_error());
    assert_eq!(r.to_content_string(), "Error: boom");
}

#[test]
fn tool_result_json() {
    let r = ToolResult::Json(json!({"key": "value"}));
    assert!(!r.is_error());
    let s = r.to_content_string();
    assert!(s.contains("key"));
    assert!(s.contains("value"));
}

// ===========================================================================
// ToolRegistry
// ===========================================================================

#[tokio::test]
async fn registry_default_is_empty() {
    let reg = ToolRegistry::new();
    assert!(reg.list().is_empty());
    assert!(reg.get_definitions().is_empty());
}

#[tokio::test]
async fn registry_execute_missing_tool() {
    let reg = ToolRegistry::new();
    let result = reg.execute("nonexistent", json!({})).await;
    assert!(result.is_error());
    assert!(result.to_content_string().contains("not found"));
}

#[tokio::test]
async fn create_default_registry_has_all_eight_tools() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let names = reg.list();
    for expected in [
        "read_file", "write_file", "edit_file", "list_directory",
        "run_command", "git_commit", "git_status", "task_complete",
    ] {
        assert!(names.contains(&expected), "missing tool: {}", expected);
    }
    assert_eq!(names.len(), 8);
    assert_eq!(reg.get_definitions().len(), 8);
    cleanup(&ws);
}

#[tokio::test]
async fn registry_tool_has_schema() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let defs = reg.get_definitions();
    for def in &defs {
        assert!(!def.name.is_empty());
        assert!(!def.description.is_empty());
        assert!(def.input_schema.is_object());
    }
    cleanup(&ws);
}

// ===========================================================================
// write_file / read_file — real filesystem
// ===========================================================================

#[tokio::test]
async fn write_file_then_read_file_round_trips() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);

    let write = reg.execute("write_file", json!({
        "path": "cycle.txt",
        "content": "alpha beta gamma",
    })).await;
    assert!(!write.is_error());

    let read = reg.execute("read_file", json!({"path": "cycle.txt"})).await;
    let content = read.to_content_string();
    assert!(content.contains("alpha beta gamma"), "{}", content);

    cleanup(&ws);
}

#[tokio::test]
async fn write_file_creates_subdirectories() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = reg.execute("write_file", json!({
        "path": "sub/dir/deep.txt",
        "content": "nested",
    })).await;
    assert!(!result.is_error());
    assert!(ws.join("sub/dir/deep.txt").exists());
    cleanup(&ws);
}

#[tokio::test]
async fn read_file_reports_error_for_missing_file() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = reg.execute("read_file", json!({"path": "nonexistent.txt"})).await;
    let content = result.to_content_string();
    assert!(content.contains("error"), "{}", content);
    cleanup(&ws);
}

#[tokio::test]
async fn write_file_missing_content_param_is_rejected() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = reg.execute("write_file", json!({"path": "foo.txt"})).await;
    assert!(result.is_error());
    cleanup(&ws);
}

// ===========================================================================
// edit_file — real filesystem
// ===========================================================================

#[tokio::test]
async fn edit_file_applies_edits_in_sequence() {
    let ws = test_workspace();
    std::fs::write(ws.join("editable.txt"), "hello world").unwrap();
    let reg = create_default_registry(&ws);
    let result = reg.execute("edit_file", json!({
        "path": "editable.txt",
        "edits": [{ "oldString": "world", "newString": "agentyard" }],
    })).await;
    assert!(!result.is_error());
    let content = std::fs::read_to_string(ws.join("editable.txt")).unwrap();
    assert_eq!(content, "hello agentyard");
    cleanup(&ws);
}

#[tokio::test]
async fn edit_file_reports_error_when_old_string_missing() {
    let ws = test_workspace();
    std::fs::write(ws.join("edit2.txt"), "hello").unwrap();
    let reg = create_default_registry(&ws);
    let result = reg.execute("edit_file", json!({
        "path": "edit2.txt",
        "edits": [{ "oldString": "nonexistent", "newString": "replaced" }],
    })).await;
    let content = result.to_content_string();
    assert!(content.contains("not found"), "{}", content);
    cleanup(&ws);
}

// ===========================================================================
// list_directory — real filesystem
// ===========================================================================

#[tokio::test]
async fn list_directory_reports_entries() {
    let ws = test_workspace();
    std::fs::write(ws.join("a.txt"), "x").unwrap();
    std::fs::create_dir(ws.join("sub")).unwrap();
    let reg = create_default_registry(&ws);
    let result = reg.execute("list_directory", json!({"path": "."})).await;
    let content = result.to_content_string();
    assert!(content.contains("a.txt"));
    assert!(content.contains("sub"));
    cleanup(&ws);
}

// ===========================================================================
// run_command — real commands
// ===========================================================================

#[tokio::test]
async fn run_command_captures_stdout() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = reg.execute("run_command", json!({"command": "echo hello"})).await;
    assert!(!result.is_error());
    assert!(result.to_content_string().contains("hello"));
    cleanup(&ws);
}

#[tokio::test]
async fn run_command_captures_exit_code() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = reg.execute("run_command", json!({"command": "exit 42"})).await;
    let content = result.to_content_string();
    assert!(content.contains("42"), "{}", content);
    cleanup(&ws);
}

#[tokio::test]
async fn run_command_honors_workspace_cwd() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = reg.execute("run_command", json!({"command": "pwd"})).await;
    assert!(result.to_content_string().contains(&ws.to_string_lossy().to_string()));
    cleanup(&ws);
}

#[tokio::test]
async fn run_command_times_out() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = reg.execute("run_command", json!({
        "command": "sleep 60",
        "timeout": 1,
    })).await;
    let content = result.to_content_string();
    assert!(content.contains("timedOut") && content.contains("true"), "{}", content);
    cleanup(&ws);
}

#[tokio::test]
async fn run_command_missing_command_param() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = reg.execute("run_command", json!({})).await;
    assert!(result.is_error());
    cleanup(&ws);
}

// ===========================================================================
// git_commit / git_status — real git repo
// ===========================================================================

async fn init_repo(ws: &std::path::Path) {
    let reg = create_default_registry(ws);
    reg.execute("run_command", json!({"command": "git init -q && git config user.email w@example.com && git config user.name w"})).await;
}

#[tokio::test]
async fn git_status_reports_untracked_files() {
    let ws = test_workspace();
    init_repo(&ws).await;
    std::fs::write(ws.join("a.txt"), "x").unwrap();
    let reg = create_default_registry(&ws);
    let result = reg.execute("git_status", json!({})).await;
    let content = result.to_content_string();
    assert!(content.contains("a.txt"), "{}", content);
    cleanup(&ws);
}

#[tokio::test]
async fn git_commit_returns_hash() {
    let ws = test_workspace();
    init_repo(&ws).await;
    std::fs::write(ws.join("a.txt"), "x").unwrap();
    let reg = create_default_registry(&ws);
    let result = reg.execute("git_commit", json!({"message": "add a.txt"})).await;
    assert!(!result.is_error());
    let content = result.to_content_string();
    assert!(content.contains("commitHash"), "{}", content);
    cleanup(&ws);
}

// ===========================================================================
// task_complete
// ===========================================================================

#[tokio::test]
async fn task_complete_returns_summary_and_artifacts() {
    let ws = test_workspace();
    let reg = create_default_registry(&ws);
    let result = reg.execute("task_complete", json!({
        "summary": "did the thing",
        "artifacts": ["out.txt"],
    })).await;
    let content = result.to_content_string();
    assert!(content.contains("did the thing"));
    assert!(content.contains("out.txt"));
    cleanup(&ws);
}
