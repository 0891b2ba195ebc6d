//! WorkerAgent — one conversation loop per leaf ticket.
//!
//! The stream-accumulate-dispatch shape: read provider deltas into a
//! buffer, dispatch accumulated tool calls, feed results back as the next
//! user turn, repeat until a completion signal or the iteration cap.

use agentyard_core::{ArtifactAction, ConversationHistory, Message, Role, ToolCallRecord};
use agentyard_llm::{AccumulatedToolCall, LlmProvider, LlmRequest, LlmTool, StreamDelta};
use agentyard_tools::ToolRegistry;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const MAX_ITERATIONS: usize = 30;

const COMPLETION_SIGNALS: &[&str] = &[
    "task_complete",
    "タスク完了",
    "作業完了",
    "done",
    "完了しました",
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkerOutcome {
    Completed,
    Partial,
}

/// Result of driving one ticket to completion (or exhausting the iteration cap).
pub struct WorkerResult {
    pub outcome: WorkerOutcome,
    pub history: ConversationHistory,
    pub artifacts: HashMap<String, ArtifactAction>,
    pub iterations: usize,
}

pub struct WorkerAgentConfig {
    pub model: String,
    pub max_iterations: usize,
    pub max_tokens: u32,
}

impl Default for WorkerAgentConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_iterations: MAX_ITERATIONS,
            max_tokens: 8192,
        }
    }
}

/// Drives one leaf ticket's conversation loop, one instance per ticket.
/// `pause()`/`resume()` suspend the loop between iterations without
/// discarding accumulated history; a paused loop parks at the top of its
/// next iteration until resumed or cancelled.
pub struct WorkerAgent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: WorkerAgentConfig,
    paused: Arc<AtomicBool>,
}

const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl WorkerAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, config: WorkerAgentConfig) -> Self {
        Self { provider, tools, config, paused: Arc::new(AtomicBool::new(false)) }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Runs the conversation loop against `system_prompt` / `user_prompt`.
    /// `history` seeds the conversation (empty for a fresh ticket, non-empty
    /// when resuming a paused worker). Always returns successfully: a
    /// provider or stream failure ends the loop with `WorkerOutcome::Partial`
    /// rather than discarding the history accumulated so far.
    pub async fn run(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        mut history: ConversationHistory,
        cancel: CancellationToken,
    ) -> WorkerResult {
        if history.messages.is_empty() {
            history.push_message(Message::system(system_prompt));
            history.push_message(Message::user(user_prompt));
        }

        let mut artifacts: HashMap<String, ArtifactAction> = HashMap::new();
        let tool_defs: Vec<LlmTool> = self.tools.get_definitions();

        let mut iteration = 0;
        let outcome = loop {
            iteration += 1;
            if iteration > self.config.max_iterations {
                break WorkerOutcome::Partial;
            }
            if cancel.is_cancelled() {
                break WorkerOutcome::Partial;
            }

            while self.is_paused() {
                if cancel.is_cancelled() {
                    break;
                }
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(PAUSE_POLL_INTERVAL) => {}
                }
            }
            if cancel.is_cancelled() {
                break WorkerOutcome::Partial;
            }

            let request = LlmRequest {
                model: self.config.model.clone(),
                messages: to_llm_messages(&history),
                tools: Some(tool_defs.clone()),
                max_tokens: Some(self.config.max_tokens),
                system: Some(system_prompt.to_string()),
                ..Default::default()
            };

            let stream = match self.provider.complete_stream(request).await {
                Ok(stream) => stream,
                Err(e) => {
                    history.push_message(Message::system(format!("provider unavailable: {}", e)));
                    break WorkerOutcome::Partial;
                }
            };
            tokio::pin!(stream);

            let mut text = String::new();
            let mut tool_calls: Vec<AccumulatedToolCall> = Vec::new();
            let mut current_tool: Option<AccumulatedToolCall> = None;
            let mut stream_failed = false;

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    delta = stream.next() => {
                        match delta {
                            Some(Ok(StreamDelta::Text(t))) => text.push_str(&t),
                            Some(Ok(StreamDelta::Thinking(_))) => {}
                            Some(Ok(StreamDelta::ToolCallStart { id, name })) => {
                                current_tool = Some(AccumulatedToolCall { id, name, arguments: String::new() });
                            }
                            Some(Ok(StreamDelta::ToolCallDelta { arguments, .. })) => {
                                if let Some(tool) = current_tool.as_mut() {
                                    tool.arguments.push_str(&arguments);
                                }
                            }
                            Some(Ok(StreamDelta::ToolCallEnd { .. })) => {
                                if let Some(tool) = current_tool.take() {
                                    tool_calls.push(tool);
                                }
                            }
                            Some(Ok(StreamDelta::Done { .. })) => break,
                            Some(Ok(StreamDelta::Error(e))) => {
                                history.push_message(Message::system(format!("stream error: {}", e)));
                                stream_failed = true;
                                break;
                            }
                            Some(Err(e)) => {
                                history.push_message(Message::system(format!("stream error: {}", e)));
                                stream_failed = true;
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }

            if stream_failed {
                break WorkerOutcome::Partial;
            }

            if cancel.is_cancelled() {
                break WorkerOutcome::Partial;
            }

            history.push_message(Message::assistant(&text));

            if contains_completion_signal(&text) {
                break WorkerOutcome::Completed;
            }

            if tool_calls.is_empty() {
                // response.isComplete with no tool calls and no signal: the
                // model considers the turn finished without saying so.
                break WorkerOutcome::Completed;
            }

            let mut saw_task_complete = false;
            let mut result_lines = Vec::new();

            for tc in tool_calls {
                let args = tc.parse_arguments().unwrap_or_default();
                let started = Instant::now();
                let result = self.tools.execute_cancellable(&tc.name, args.clone(), cancel.clone()).await;
                let duration_ms = started.elapsed().as_millis() as u64;
                let is_error = result.is_error();
                let content = result.to_content_string();

                record_artifact(&mut artifacts, &tc.name, &args);

                history.push_tool_call(ToolCallRecord {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: args,
                    result: if is_error {
                        None
                    } else {
                        Some(serde_json::from_str(&content).unwrap_or_else(|_| serde_json::Value::String(content.clone())))
                    },
                    error: if is_error { Some(content.clone()) } else { None },
                    timestamp: chrono::Utc::now(),
                    duration_ms,
                });

                result_lines.push(format!("[{}] {}", tc.name, content));
                if tc.name == "task_complete" {
                    saw_task_complete = true;
                }
            }

            history.push_message(Message::user(result_lines.join("\n\n")));

            if saw_task_complete {
                break WorkerOutcome::Completed;
            }

            debug!(iteration, "worker loop continuing after tool dispatch");
        };

        info!(
            iterations = iteration,
            outcome = ?outcome,
            messages = history.messages.len(),
            "worker conversation loop finished"
        );

        WorkerResult {
            outcome,
            history,
            artifacts,
            iterations: iteration,
        }
    }
}

fn contains_completion_signal(text: &str) -> bool {
    let lower = text.to_lowercase();
    COMPLETION_SIGNALS.iter().any(|s| lower.contains(&s.to_lowercase()))
}

/// `write_file` marks `created`, `edit_file` marks `modified`; duplicate
/// paths collapse to the last action.
fn record_artifact(artifacts: &mut HashMap<String, ArtifactAction>, tool_name: &str, args: &serde_json::Value) {
    match tool_name {
        "write_file" => {
            if let Some(path) = args.get("path").and_then(|v| v.as_str()) {
                artifacts.insert(path.to_string(), ArtifactAction::Created);
            }
        }
        "edit_file" => {
            if let Some(path) = args.get("path").and_then(|v| v.as_str()) {
                artifacts.insert(path.to_string(), ArtifactAction::Modified);
            }
        }
        "task_complete" => {
            if let Some(list) = args.get("artifacts").and_then(|v| v.as_array()) {
                for path in list.iter().filter_map(|v| v.as_str()) {
                    artifacts.insert(path.to_string(), ArtifactAction::Created);
                }
            }
        }
        _ => {}
    }
}

fn to_llm_messages(history: &ConversationHistory) -> Vec<agentyard_llm::LlmMessage> {
    history
        .messages
        .iter()
        .map(|m| agentyard_llm::LlmMessage {
            role: match m.role {
                Role::System => "system".to_string(),
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: m.content.clone().into(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentyard_llm::ScriptedProvider;
    use agentyard_llm::ScriptedTurn;

    fn tools() -> Arc<ToolRegistry> {
        Arc::new(agentyard_tools::create_default_registry(std::env::temp_dir()))
    }

    #[tokio::test]
    async fn completes_on_task_complete_tool_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![ScriptedTurn::ToolCall {
            id: "t1".to_string(),
            name: "task_complete".to_string(),
            arguments: r#"{"summary":"done","artifacts":["out.txt"]}"#.to_string(),
        }]));
        let worker = WorkerAgent::new(provider, tools(), WorkerAgentConfig::default());
        let result = worker
            .run("system", "do the thing", ConversationHistory::default(), CancellationToken::new())
            .await;
        assert_eq!(result.outcome, WorkerOutcome::Completed);
        assert_eq!(result.artifacts.get("out.txt"), Some(&ArtifactAction::Created));
    }

    #[tokio::test]
    async fn completes_on_text_completion_signal() {
        let provider = Arc::new(ScriptedProvider::new(vec![ScriptedTurn::Text("All done. DONE".to_string())]));
        let worker = WorkerAgent::new(provider, tools(), WorkerAgentConfig::default());
        let result = worker
            .run("system", "do the thing", ConversationHistory::default(), CancellationToken::new())
            .await;
        assert_eq!(result.outcome, WorkerOutcome::Completed);
    }

    #[tokio::test]
    async fn reaches_iteration_cap_without_completion() {
        let provider = Arc::new(ScriptedProvider::new(vec![ScriptedTurn::ToolCall {
            id: "t1".to_string(),
            name: "git_status".to_string(),
            arguments: "{}".to_string(),
        }]));
        let mut config = WorkerAgentConfig::default();
        config.max_iterations = 3;
        let worker = WorkerAgent::new(provider, tools(), config);
        let result = worker
            .run("system", "loop forever", ConversationHistory::default(), CancellationToken::new())
            .await;
        assert_eq!(result.outcome, WorkerOutcome::Partial);
        assert_eq!(result.iterations, 4);
    }

    #[tokio::test]
    async fn tracks_write_then_edit_as_modified() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedTurn::ToolCall {
                id: "t1".to_string(),
                name: "write_file".to_string(),
                arguments: r#"{"path":"a.txt","content":"x"}"#.to_string(),
            },
            ScriptedTurn::ToolCall {
                id: "t2".to_string(),
                name: "edit_file".to_string(),
                arguments: r#"{"path":"a.txt","edits":[{"oldString":"x","newString":"y"}]}"#.to_string(),
            },
            ScriptedTurn::ToolCall {
                id: "t3".to_string(),
                name: "task_complete".to_string(),
                arguments: r#"{"summary":"done"}"#.to_string(),
            },
        ]));
        let tools = Arc::new(agentyard_tools::create_default_registry(dir.path()));
        let worker = WorkerAgent::new(provider, tools, WorkerAgentConfig::default());
        let result = worker
            .run("system", "edit a file", ConversationHistory::default(), CancellationToken::new())
            .await;
        assert_eq!(result.artifacts.get("a.txt"), Some(&ArtifactAction::Modified));
    }
}
