//! task_complete — the worker signals it is done and the loop should stop
//!
//! Unlike every other tool, this one has no side effect of its own; its
//! purpose is entirely to be observed by the caller. `agentyard_agent::worker`
//! checks the tool name on every call and ends the conversation loop when it
//! sees this one, treating `artifacts` as additional created-file records.

use crate::registry::{Tool, ToolResult};
use serde_json::{json, Value};

pub struct TaskCompleteTool;

impl TaskCompleteTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TaskCompleteTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for TaskCompleteTool {
    fn name(&self) -> &str {
        "task_complete"
    }

    fn description(&self) -> &str {
        "Signal that the assigned task is finished. Call this once the work is \
         done instead of continuing to make tool calls."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "Summary of the work performed"
                },
                "artifacts": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Paths created or modified as part of this task"
                }
            },
            "required": ["summary"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let summary = args.get("summary").and_then(|v| v.as_str()).unwrap_or("");
        let artifacts: Vec<String> = args
            .get("artifacts")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        ToolResult::Json(json!({
            "summary": summary,
            "artifacts": artifacts,
        }))
    }
}
