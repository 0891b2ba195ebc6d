//! A deterministic provider that replays a fixed script of turns instead of
//! calling a network API. Used to drive the worker conversation loop in
//! tests without a live AI backend, and as the `AI_UNAVAILABLE` degradation
//! path's opposite: a provider that is always available.

use crate::provider::{LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{LlmRequest, StreamDelta};
use futures::stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One scripted turn: either plain text (ending the loop) or a tool call.
#[derive(Clone, Debug)]
pub enum ScriptedTurn {
    Text(String),
    ToolCall { id: String, name: String, arguments: String },
}

/// Replays `turns` in order, one per call to `complete_stream`. Calling past
/// the end of the script repeats the final turn, so tests don't need to
/// pad the script to the iteration cap.
pub struct ScriptedProvider {
    turns: Vec<ScriptedTurn>,
    cursor: AtomicUsize,
    recorded_requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns,
            cursor: AtomicUsize::new(0),
            recorded_requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests the provider has been asked to complete, for assertions
    /// about what the worker loop sent (e.g. tool definitions present).
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.recorded_requests.lock().unwrap().clone()
    }

    pub fn calls_made(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn models(&self) -> &[&str] {
        &["scripted-any"]
    }

    fn supports_model(&self, _model: &str) -> bool {
        true
    }

    async fn complete_stream(&self, request: LlmRequest) -> LlmResult<LlmStream> {
        self.recorded_requests.lock().unwrap().push(request);

        if self.turns.is_empty() {
            return Err(LlmError::InvalidResponse("script is empty".to_string()));
        }

        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let turn = self.turns[index.min(self.turns.len() - 1)].clone();

        let deltas: Vec<LlmResult<StreamDelta>> = match turn {
            ScriptedTurn::Text(text) => vec![
                Ok(StreamDelta::Text(text)),
                Ok(StreamDelta::Done {
                    stop_reason: Some("end_turn".to_string()),
                    usage: None,
                }),
            ],
            ScriptedTurn::ToolCall { id, name, arguments } => vec![
                Ok(StreamDelta::ToolCallStart {
                    id: id.clone(),
                    name,
                }),
                Ok(StreamDelta::ToolCallDelta {
                    id: id.clone(),
                    arguments,
                }),
                Ok(StreamDelta::ToolCallEnd { id }),
                Ok(StreamDelta::Done {
                    stop_reason: Some("tool_use".to_string()),
                    usage: None,
                }),
            ],
        };

        Ok(Box::pin(stream::iter(deltas)))
    }
}
