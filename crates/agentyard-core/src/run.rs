//! Per-run execution state, as persisted to `runs/<runId>/state.json`.

use crate::ids::{AgentId, RunId, TicketId, WorkerId};
use crate::types::{Message, ToolCallRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Paused,
    Completed,
    Failed,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Working,
    Partial,
    Completed,
    Failed,
    Terminated,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerState {
    pub worker_id: WorkerId,
    pub status: WorkerStatus,
    pub current_ticket: Option<TicketId>,
    pub iterations: usize,
}

/// How a worker's tool call touched a path. Duplicate paths collapse to
/// the last action recorded.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactAction {
    Created,
    Modified,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub messages: Vec<Message>,
    pub tool_calls: Vec<ToolCallRecord>,
    pub total_tokens: u64,
}

impl ConversationHistory {
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn push_tool_call(&mut self, record: ToolCallRecord) {
        self.tool_calls.push(record);
    }
}

/// One run's full state: worker statuses, conversation histories, and the
/// git branch each agent is working on, persisted as `runs/<runId>/state.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionState {
    pub run_id: RunId,
    pub ticket_id: TicketId,
    pub status: RunStatus,
    pub worker_states: HashMap<WorkerId, WorkerState>,
    pub conversation_histories: HashMap<AgentId, ConversationHistory>,
    pub git_branches: HashMap<AgentId, String>,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl ExecutionState {
    pub fn new(run_id: RunId, ticket_id: TicketId) -> Self {
        Self {
            run_id,
            ticket_id,
            status: RunStatus::Running,
            worker_states: HashMap::new(),
            conversation_histories: HashMap::new(),
            git_branches: HashMap::new(),
            last_updated: chrono::Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_updated = chrono::Utc::now();
    }
}
